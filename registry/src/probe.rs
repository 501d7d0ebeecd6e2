use mlg_common::{Error, ErrorKind};
use reqwest::{Method, StatusCode};

use crate::distribution::ImageRef;

const MANIFEST_ACCEPT: &str = concat!(
    "application/vnd.oci.image.manifest.v1+json, ",
    "application/vnd.oci.image.index.v1+json, ",
    "application/vnd.docker.distribution.manifest.v2+json, ",
    "application/vnd.docker.distribution.manifest.list.v2+json",
);

/// Probes the registry for an existing manifest at the image's tag, per `SPEC_FULL.md`
/// §4.3: HEAD first, falling back to GET on `405 Method Not Allowed`.
pub struct RegistryClient {
    agent: reqwest::Client,
}

impl RegistryClient {
    pub fn new() -> Self {
        Self {
            agent: reqwest::Client::new(),
        }
    }

    pub async fn image_exists(&self, image_ref: &ImageRef) -> Result<bool, Error> {
        let scheme = if image_ref.registry.starts_with("localhost") {
            "http"
        } else {
            "https"
        };
        let url = format!("{scheme}://{}{}", image_ref.registry, image_ref.manifest_path());

        let head_resp = self
            .agent
            .request(Method::HEAD, &url)
            .header(reqwest::header::ACCEPT, MANIFEST_ACCEPT)
            .send()
            .await
            .map_err(|err| Error::source(ErrorKind::RegistryUnavailable, err))?;

        match head_resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::METHOD_NOT_ALLOWED => self.probe_with_get(&url).await,
            other => Err(Error::custom(
                ErrorKind::RegistryUnavailable,
                format!("unexpected status probing manifest: {other}"),
            )),
        }
    }

    async fn probe_with_get(&self, url: &str) -> Result<bool, Error> {
        let resp = self
            .agent
            .get(url)
            .header(reqwest::header::ACCEPT, MANIFEST_ACCEPT)
            .send()
            .await
            .map_err(|err| Error::source(ErrorKind::RegistryUnavailable, err))?;

        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(Error::custom(
                ErrorKind::RegistryUnavailable,
                format!("unexpected status probing manifest via GET: {other}"),
            )),
        }
    }
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image_ref(registry: &str) -> ImageRef {
        ImageRef::parse(&format!("{registry}/dp-acme-default/hello:abcd123")).unwrap()
    }

    #[tokio::test]
    async fn head_200_means_exists() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/v2/dp-acme-default/hello/manifests/abcd123"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let registry_host = server.address().to_string();
        let client = RegistryClient::new();
        let exists = client.image_exists(&image_ref(&format!("localhost:{}", server.address().port()))).await.unwrap();
        assert!(exists);
        let _ = registry_host;
    }

    #[tokio::test]
    async fn head_404_means_missing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/v2/dp-acme-default/hello/manifests/abcd123"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = RegistryClient::new();
        let exists = client
            .image_exists(&image_ref(&format!("localhost:{}", server.address().port())))
            .await
            .unwrap();
        assert!(!exists);
    }

    #[tokio::test]
    async fn falls_back_to_get_on_405() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/v2/dp-acme-default/hello/manifests/abcd123"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/dp-acme-default/hello/manifests/abcd123"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = RegistryClient::new();
        let exists = client
            .image_exists(&image_ref(&format!("localhost:{}", server.address().port())))
            .await
            .unwrap();
        assert!(exists);
    }
}
