use reqwest::{Response, StatusCode};
use url::Url;

use crate::ClientError;

/// Parse `base` so that relative joins append to its path.
pub fn base_url(base: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(base.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Turn a non-success response into [`ClientError::Status`].
pub async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(status_error(status, resp).await)
}

pub async fn status_error(status: StatusCode, resp: Response) -> ClientError {
    let body = resp.text().await.unwrap_or_default();
    ClientError::Status {
        status: status.as_u16(),
        body: body.trim().to_string(),
    }
}
