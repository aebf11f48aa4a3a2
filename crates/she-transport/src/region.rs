/// An owned pair of request/response buffers for exercising a transport
/// within a single process (tests, `she-harness`). A real deployment has no
/// equivalent of this type: the buffers live in memory shared between an HSM
/// server and its client, mapped in by whatever IPC mechanism the host
/// platform provides, and `ShmTransportContext::new` is handed raw pointers
/// into that mapping directly.
pub struct ShmRegion {
    req: Box<[u64]>,
    resp: Box<[u64]>,
    req_bytes: usize,
    resp_bytes: usize,
}

impl ShmRegion {
    /// Allocate an 8-byte-aligned region of at least `req_size`/`resp_size`
    /// bytes for each buffer (rounded up to a whole number of CSR words).
    pub fn new(req_size: usize, resp_size: usize) -> Self {
        let req_words = req_size.div_ceil(8).max(1);
        let resp_words = resp_size.div_ceil(8).max(1);
        Self {
            req: vec![0u64; req_words].into_boxed_slice(),
            resp: vec![0u64; resp_words].into_boxed_slice(),
            req_bytes: req_words * 8,
            resp_bytes: resp_words * 8,
        }
    }

    /// Raw `(pointer, len)` pairs for the request and response buffers,
    /// suitable for [`ShmTransportContext::new`](crate::ShmTransportContext::new).
    pub fn halves(&mut self) -> ((*mut u8, usize), (*mut u8, usize)) {
        (
            (self.req.as_mut_ptr().cast::<u8>(), self.req_bytes),
            (self.resp.as_mut_ptr().cast::<u8>(), self.resp_bytes),
        )
    }

    /// Build a client/server `ShmTransportContext` pair sharing this region's
    /// buffers. Safe callers (in-process tests, `she-harness`) that never
    /// touch raw pointers can reach the transport entirely through this
    /// constructor instead of `ShmTransportContext::new`. The returned
    /// [`ShmContexts`] keeps `self` mutably borrowed for as long as either
    /// context is alive, so a caller cannot drop or otherwise invalidate the
    /// region's backing storage while a context still points into it.
    pub fn contexts(&mut self) -> ShmContexts<'_> {
        let (req, resp) = self.halves();
        // SAFETY: req/resp point into this region's own boxed storage, kept
        // borrowed by `ShmContexts`'s lifetime for as long as either context
        // returned here is alive.
        let client = unsafe { crate::ShmTransportContext::new(req.0, req.1, resp.0, resp.1) }
            .expect("region buffers always exceed CSR_SIZE");
        let server = unsafe { crate::ShmTransportContext::new(req.0, req.1, resp.0, resp.1) }
            .expect("region buffers always exceed CSR_SIZE");
        ShmContexts {
            client,
            server,
            _region: std::marker::PhantomData,
        }
    }
}

/// A client/server `ShmTransportContext` pair borrowed from one [`ShmRegion`].
/// The `'a` lifetime ties both contexts to the region they were built from,
/// so the region cannot be moved or dropped out from under them while this
/// value is alive.
pub struct ShmContexts<'a> {
    pub client: crate::ShmTransportContext,
    pub server: crate::ShmTransportContext,
    _region: std::marker::PhantomData<&'a mut ShmRegion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_whole_words() {
        let mut region = ShmRegion::new(9, 1);
        let (req, resp) = region.halves();
        assert_eq!(req.1, 16);
        assert_eq!(resp.1, 8);
        assert_eq!(req.0 as usize % 8, 0);
        assert_eq!(resp.0 as usize % 8, 0);
    }
}
