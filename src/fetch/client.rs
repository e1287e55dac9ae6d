use reqwest::blocking::{Request, Response};

/// Blocking transport seam: executes one fully built request.
pub trait HttpClient: Send + Sync {
    fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

impl<C: HttpClient + ?Sized> HttpClient for &C {
    fn execute(&self, req: Request) -> reqwest::Result<Response> {
        (**self).execute(req)
    }
}
