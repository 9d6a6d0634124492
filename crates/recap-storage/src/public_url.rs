//! Rewrite the internal R2 endpoint in a presigned URL to the bucket's
//! public endpoint, so a URL handed to clients never exposes the
//! account-scoped S3 API host.

use url::Url;

/// Rewrite `presigned_url`'s scheme+host+port to `public_base_url`'s,
/// keeping path and query (the presigned signature is computed over the
/// path/query, so only the host may change without invalidating it).
pub fn rewrite_to_public_endpoint(presigned_url: &str, public_base_url: &str) -> Option<String> {
    let mut url = Url::parse(presigned_url).ok()?;
    let public = Url::parse(public_base_url).ok()?;

    url.set_scheme(public.scheme()).ok()?;
    url.set_host(public.host_str()).ok()?;
    url.set_port(public.port()).ok()?;

    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_host_preserving_path_and_query() {
        let presigned = "https://internal.r2.cloudflarestorage.com/output/job1/final_recap.mp4?X-Amz-Signature=abc";
        let public = "https://cdn.example.com";
        let rewritten = rewrite_to_public_endpoint(presigned, public).unwrap();
        assert_eq!(
            rewritten,
            "https://cdn.example.com/output/job1/final_recap.mp4?X-Amz-Signature=abc"
        );
    }

    #[test]
    fn returns_none_for_invalid_url() {
        assert!(rewrite_to_public_endpoint("not a url", "https://cdn.example.com").is_none());
    }
}
