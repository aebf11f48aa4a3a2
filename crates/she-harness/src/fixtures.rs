//! Scenario metadata: the human-readable description of an end-to-end test
//! case, kept separate from the Rust closure that actually drives the engine
//! (see [`crate::scenarios`]) so the description can be loaded from a file
//! and compared against what ran.

use serde::{Deserialize, Serialize};

/// One step of a scenario: a short label and the outcome it is expected to
/// produce, for narration/comparison purposes. The step itself is executed
/// by the matching `scenarios::` function, not reconstructed from this data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub label: String,
    pub expected_outcome: String,
}

/// A single named end-to-end scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioCase {
    pub name: String,
    pub description: String,
    pub steps: Vec<ScenarioStep>,
}

/// A collection of scenario cases, as loaded from a fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub version: String,
    pub cases: Vec<ScenarioCase>,
}

impl ScenarioSet {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}

/// The built-in scenario descriptions, matched by name to a
/// `scenarios::run_*` function. Kept as data so `she-harness run <name>`
/// can print what it's about to do before driving the engine.
pub fn builtin_scenarios() -> ScenarioSet {
    ScenarioSet {
        version: "1".to_string(),
        cases: vec![
            ScenarioCase {
                name: "boot_bypass".to_string(),
                description:
                    "SET_UID then SECURE_BOOT_INIT with no BOOT_MAC_KEY provisioned falls through to a successful, unverified boot.".to_string(),
                steps: vec![
                    ScenarioStep { label: "SET_UID".to_string(), expected_outcome: "Ok".to_string() },
                    ScenarioStep { label: "GET_STATUS".to_string(), expected_outcome: "sreg=0".to_string() },
                    ScenarioStep { label: "SECURE_BOOT_INIT".to_string(), expected_outcome: "NoSecureBoot".to_string() },
                    ScenarioStep { label: "GET_STATUS".to_string(), expected_outcome: "BOOT_FINISHED|BOOT_OK set, SECURE_BOOT clear".to_string() },
                ],
            },
            ScenarioCase {
                name: "ram_key_ecb".to_string(),
                description: "LOAD_PLAIN_KEY followed by ENC_ECB produces two identical ciphertext blocks for two identical plaintext blocks.".to_string(),
                steps: vec![
                    ScenarioStep { label: "LOAD_PLAIN_KEY".to_string(), expected_outcome: "Ok".to_string() },
                    ScenarioStep { label: "ENC_ECB".to_string(), expected_outcome: "two identical 16-byte blocks".to_string() },
                ],
            },
            ScenarioCase {
                name: "load_key_rollback".to_string(),
                description: "A second LOAD_KEY with a non-increasing counter on the same slot is rejected.".to_string(),
                steps: vec![
                    ScenarioStep { label: "LOAD_KEY counter=1".to_string(), expected_outcome: "Ok".to_string() },
                    ScenarioStep { label: "LOAD_KEY counter=1".to_string(), expected_outcome: "KeyUpdateError".to_string() },
                ],
            },
            ScenarioCase {
                name: "prng_sequence".to_string(),
                description: "INIT_RND twice fails the second time; two RND calls after init produce different output.".to_string(),
                steps: vec![
                    ScenarioStep { label: "INIT_RND".to_string(), expected_outcome: "Ok".to_string() },
                    ScenarioStep { label: "INIT_RND".to_string(), expected_outcome: "SequenceError".to_string() },
                    ScenarioStep { label: "RND".to_string(), expected_outcome: "16 bytes".to_string() },
                    ScenarioStep { label: "RND".to_string(), expected_outcome: "different 16 bytes".to_string() },
                ],
            },
            ScenarioCase {
                name: "transport_round_trip".to_string(),
                description: "A client request and server response round-trip exactly over the shared-memory transport, and a second client recv without a new send reports NotReady.".to_string(),
                steps: vec![
                    ScenarioStep { label: "client send_request".to_string(), expected_outcome: "Ok".to_string() },
                    ScenarioStep { label: "server recv_request".to_string(), expected_outcome: "same bytes".to_string() },
                    ScenarioStep { label: "server send_response".to_string(), expected_outcome: "Ok".to_string() },
                    ScenarioStep { label: "client recv_response".to_string(), expected_outcome: "same bytes".to_string() },
                    ScenarioStep { label: "client recv_response again".to_string(), expected_outcome: "NotReady".to_string() },
                ],
            },
            ScenarioCase {
                name: "secure_boot_overrun".to_string(),
                description: "SECURE_BOOT_UPDATE supplying more bytes than SECURE_BOOT_INIT announced resets the state machine to Init.".to_string(),
                steps: vec![
                    ScenarioStep { label: "SECURE_BOOT_INIT sz=16".to_string(), expected_outcome: "Ok".to_string() },
                    ScenarioStep { label: "SECURE_BOOT_UPDATE 32 bytes".to_string(), expected_outcome: "SequenceError, sb_state=Init".to_string() },
                ],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set_round_trips_through_json() {
        let set = builtin_scenarios();
        let json = set.to_json().unwrap();
        let parsed = ScenarioSet::from_json(&json).unwrap();
        assert_eq!(parsed.cases.len(), set.cases.len());
    }
}
