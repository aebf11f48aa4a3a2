use std::sync::atomic::{AtomicU64, Ordering};

use crate::csr::Csr;
use crate::{TransportError, CSR_SIZE};

/// Two shared buffers (request, response), each prefixed by a CSR, driving
/// one side of the transport. The same raw memory is expected to back both a
/// client-side and a server-side `ShmTransportContext` — the handshake lives
/// entirely in the CSR counters, not in which side constructed the context.
pub struct ShmTransportContext {
    req_base: *mut u8,
    req_size: usize,
    resp_base: *mut u8,
    resp_size: usize,
    initialized: bool,
}

// SAFETY: all access goes through atomic loads/stores on the CSR and raw
// copies into/out of caller-owned buffers; there is no interior state beyond
// the pointers themselves.
unsafe impl Send for ShmTransportContext {}

impl ShmTransportContext {
    /// # Safety
    ///
    /// `req_base` and `resp_base` must each be valid for reads and writes of
    /// `req_size`/`resp_size` bytes, at least 8-byte aligned, and remain
    /// valid for as long as this context (and any other context sharing the
    /// same buffers) is alive.
    pub unsafe fn new(
        req_base: *mut u8,
        req_size: usize,
        resp_base: *mut u8,
        resp_size: usize,
    ) -> Result<Self, TransportError> {
        if req_base.is_null()
            || resp_base.is_null()
            || req_size <= CSR_SIZE
            || resp_size <= CSR_SIZE
        {
            return Err(TransportError::BadArgs);
        }
        Ok(Self {
            req_base,
            req_size,
            resp_base,
            resp_size,
            initialized: false,
        })
    }

    fn req_csr(&self) -> &AtomicU64 {
        // SAFETY: constructor guarantees req_base is valid+aligned for req_size bytes.
        unsafe { &*(self.req_base as *const AtomicU64) }
    }

    fn resp_csr(&self) -> &AtomicU64 {
        // SAFETY: constructor guarantees resp_base is valid+aligned for resp_size bytes.
        unsafe { &*(self.resp_base as *const AtomicU64) }
    }

    fn req_data(&self) -> *mut u8 {
        // SAFETY: req_size > CSR_SIZE is enforced at construction.
        unsafe { self.req_base.add(CSR_SIZE) }
    }

    fn resp_data(&self) -> *mut u8 {
        // SAFETY: resp_size > CSR_SIZE is enforced at construction.
        unsafe { self.resp_base.add(CSR_SIZE) }
    }

    fn req_data_cap(&self) -> usize {
        self.req_size - CSR_SIZE
    }

    fn resp_data_cap(&self) -> usize {
        self.resp_size - CSR_SIZE
    }

    fn load_req(&self) -> Csr {
        Csr::from_u64(self.req_csr().load(Ordering::Acquire))
    }

    fn load_resp(&self) -> Csr {
        Csr::from_u64(self.resp_csr().load(Ordering::Acquire))
    }

    fn store_req(&self, csr: Csr) {
        self.req_csr().store(csr.to_u64(), Ordering::Release);
    }

    fn store_resp(&self, csr: Csr) {
        self.resp_csr().store(csr.to_u64(), Ordering::Release);
    }

    fn check_init(&self) -> Result<(), TransportError> {
        if self.initialized {
            Ok(())
        } else {
            Err(TransportError::BadArgs)
        }
    }

    /// Mark the context ready without touching the underlying buffers
    /// (server side: the request may already be in flight).
    pub fn init(&mut self) -> Result<(), TransportError> {
        self.initialized = true;
        Ok(())
    }

    /// Mark the context ready and zero both buffers (client side: start the
    /// handshake from a known-quiescent state).
    pub fn init_clear(&mut self) -> Result<(), TransportError> {
        self.init()?;
        // SAFETY: constructor guarantees req_base/resp_base are valid for
        // req_size/resp_size bytes each.
        unsafe {
            std::ptr::write_bytes(self.req_base, 0, self.req_size);
            std::ptr::write_bytes(self.resp_base, 0, self.resp_size);
        }
        Ok(())
    }

    pub fn cleanup(&mut self) -> Result<(), TransportError> {
        self.initialized = false;
        Ok(())
    }

    /// Publish a new request. Fails with [`TransportError::NotReady`] while
    /// the server has not yet consumed and answered the previous one.
    pub fn send_request(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.check_init()?;
        let resp = self.load_resp();
        let mut req = self.load_req();
        if req.notify != resp.notify {
            return Err(TransportError::NotReady);
        }
        if data.len() > self.req_data_cap() {
            return Err(TransportError::BadArgs);
        }
        if !data.is_empty() {
            // SAFETY: length checked against req_data_cap above.
            unsafe {
                std::ptr::copy_nonoverlapping(data.as_ptr(), self.req_data(), data.len());
            }
        }
        req.len = data.len() as u16;
        req.notify = req.notify.wrapping_add(1);
        self.store_req(req);
        Ok(())
    }

    /// Receive the pending request, if any. Fails with `NotReady` when no
    /// new request has been published since the last one was answered.
    pub fn recv_request(&mut self, out: &mut [u8]) -> Result<u16, TransportError> {
        self.check_init()?;
        let req = self.load_req();
        let resp = self.load_resp();
        if req.notify == resp.notify {
            return Err(TransportError::NotReady);
        }
        let len = req.len as usize;
        if len != 0 {
            let copy_len = len.min(out.len());
            // SAFETY: req_data is valid for req_data_cap() bytes, copy_len <= out.len().
            unsafe {
                std::ptr::copy_nonoverlapping(self.req_data(), out.as_mut_ptr(), copy_len);
            }
        }
        Ok(req.len)
    }

    /// Publish the response to the request currently outstanding.
    pub fn send_response(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.check_init()?;
        let req = self.load_req();
        let mut resp = self.load_resp();
        if data.len() > self.resp_data_cap() {
            return Err(TransportError::BadArgs);
        }
        if !data.is_empty() {
            // SAFETY: length checked against resp_data_cap above.
            unsafe {
                std::ptr::copy_nonoverlapping(data.as_ptr(), self.resp_data(), data.len());
            }
        }
        resp.len = data.len() as u16;
        resp.notify = req.notify;
        self.store_resp(resp);
        Ok(())
    }

    /// Receive the response to the last request sent, if the server has
    /// answered it yet.
    pub fn recv_response(&mut self, out: &mut [u8]) -> Result<u16, TransportError> {
        self.check_init()?;
        let req = self.load_req();
        let resp = self.load_resp();
        if resp.notify != req.notify {
            return Err(TransportError::NotReady);
        }
        let len = resp.len as usize;
        if len != 0 {
            let copy_len = len.min(out.len());
            // SAFETY: resp_data is valid for resp_data_cap() bytes, copy_len <= out.len().
            unsafe {
                std::ptr::copy_nonoverlapping(self.resp_data(), out.as_mut_ptr(), copy_len);
            }
        }
        Ok(resp.len)
    }
}
