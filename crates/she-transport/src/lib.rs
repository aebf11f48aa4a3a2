//! Lock-free two-buffer shared-memory transport for the HSM request/response
//! channel: one buffer carries the client's request, the other the server's
//! response, each prefixed by an 8-byte control/status register (CSR).
//!
//! The handshake is driven entirely by a `notify` counter: the client bumps
//! its buffer's `notify` field to publish a new request, the server mirrors
//! that counter into its own buffer's `notify` field to publish the matching
//! response. Neither side blocks; every operation either completes or
//! returns [`TransportError::NotReady`].

mod context;
mod csr;
mod region;

pub use context::ShmTransportContext;
pub use region::{ShmContexts, ShmRegion};

use thiserror::Error;

/// Size in bytes of the CSR that prefixes every buffer.
pub const CSR_SIZE: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid transport arguments")]
    BadArgs,
    #[error("transport not ready")]
    NotReady,
}

/// The client side of a request/response pair: sends requests, receives
/// responses.
pub trait ClientTransport {
    fn init(&mut self) -> Result<(), TransportError>;
    fn send_request(&mut self, data: &[u8]) -> Result<(), TransportError>;
    fn recv_response(&mut self, out: &mut [u8]) -> Result<u16, TransportError>;
    fn cleanup(&mut self) -> Result<(), TransportError>;
}

/// The server side of a request/response pair: receives requests, sends
/// responses.
pub trait ServerTransport {
    fn init(&mut self) -> Result<(), TransportError>;
    fn recv_request(&mut self, out: &mut [u8]) -> Result<u16, TransportError>;
    fn send_response(&mut self, data: &[u8]) -> Result<(), TransportError>;
    fn cleanup(&mut self) -> Result<(), TransportError>;
}

impl ClientTransport for ShmTransportContext {
    fn init(&mut self) -> Result<(), TransportError> {
        self.init_clear()
    }

    fn send_request(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.send_request(data)
    }

    fn recv_response(&mut self, out: &mut [u8]) -> Result<u16, TransportError> {
        self.recv_response(out)
    }

    fn cleanup(&mut self) -> Result<(), TransportError> {
        self.cleanup()
    }
}

impl ServerTransport for ShmTransportContext {
    fn init(&mut self) -> Result<(), TransportError> {
        self.init()
    }

    fn recv_request(&mut self, out: &mut [u8]) -> Result<u16, TransportError> {
        self.recv_request(out)
    }

    fn send_response(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.send_response(data)
    }

    fn cleanup(&mut self) -> Result<(), TransportError> {
        self.cleanup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_response_round_trip() {
        let mut region = ShmRegion::new(256, 256);
        let (req, resp) = region.halves();
        let mut client = unsafe { ShmTransportContext::new(req.0, req.1, resp.0, resp.1) }.unwrap();
        let mut server = unsafe { ShmTransportContext::new(req.0, req.1, resp.0, resp.1) }.unwrap();

        ClientTransport::init(&mut client).unwrap();
        ServerTransport::init(&mut server).unwrap();

        ClientTransport::send_request(&mut client, &[1, 2, 3, 4]).unwrap();

        let mut buf = [0u8; 256 - CSR_SIZE];
        let len = ServerTransport::recv_request(&mut server, &mut buf).unwrap();
        assert_eq!(len, 4);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);

        ServerTransport::send_response(&mut server, &[9, 9]).unwrap();

        let len = ClientTransport::recv_response(&mut client, &mut buf).unwrap();
        assert_eq!(len, 2);
        assert_eq!(&buf[..2], &[9, 9]);

        // Nothing new has been sent, so a second recv must report not-ready.
        assert_eq!(
            ServerTransport::recv_request(&mut server, &mut buf),
            Err(TransportError::NotReady)
        );
    }

    #[test]
    fn send_request_blocks_until_previous_is_consumed() {
        let mut region = ShmRegion::new(64, 64);
        let (req, resp) = region.halves();
        let mut client = unsafe { ShmTransportContext::new(req.0, req.1, resp.0, resp.1) }.unwrap();
        let mut server = unsafe { ShmTransportContext::new(req.0, req.1, resp.0, resp.1) }.unwrap();
        ClientTransport::init(&mut client).unwrap();
        ServerTransport::init(&mut server).unwrap();

        ClientTransport::send_request(&mut client, &[1]).unwrap();
        // Server has not yet answered, a second request must not be accepted.
        assert_eq!(
            ClientTransport::send_request(&mut client, &[2]),
            Err(TransportError::NotReady)
        );

        let mut buf = [0u8; 64 - CSR_SIZE];
        ServerTransport::recv_request(&mut server, &mut buf).unwrap();
        ServerTransport::send_response(&mut server, &[]).unwrap();
        ClientTransport::recv_response(&mut client, &mut buf).unwrap();

        ClientTransport::send_request(&mut client, &[2]).unwrap();
    }

    #[test]
    fn rejects_undersized_region() {
        let mut buf = [0u8; CSR_SIZE];
        let err = unsafe {
            ShmTransportContext::new(buf.as_mut_ptr(), buf.len(), buf.as_mut_ptr(), buf.len())
        }
        .unwrap_err();
        assert_eq!(err, TransportError::BadArgs);
    }
}
