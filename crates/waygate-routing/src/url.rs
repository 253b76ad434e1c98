//! Gateway URL construction for content references.

use waygate_core::{is_valid_dns_label, ContentReference};

/// Splits an origin like `https://host:8443` into scheme, host and an
/// explicit port. Returns `None` for anything that is not a plain origin.
pub fn split_origin(origin: &str) -> Option<(&str, &str, Option<u16>)> {
    let (scheme, rest) = origin.split_once("://")?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    match rest.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse().ok()?;
            Some((scheme, host, Some(port)))
        }
        _ => Some((scheme, rest, None)),
    }
}

/// Builds the request URL for `reference` against a gateway origin.
///
/// Id references always use the path form. Name references use the
/// subdomain form when the label is a valid DNS label; anything else rides
/// the path form and the gateway resolves it server-side.
pub fn build_content_url(origin: &str, reference: &ContentReference) -> String {
    let origin = origin.trim_end_matches('/');
    match reference {
        ContentReference::Id { tx_id, path } => match path {
            None => format!("{origin}/{tx_id}"),
            Some(path) => format!("{origin}/{tx_id}/{path}"),
        },
        ContentReference::Name { label, path } => {
            let suffix = match path {
                None => String::new(),
                Some(path) => format!("/{path}"),
            };
            match split_origin(origin) {
                Some((scheme, host, port)) if is_valid_dns_label(label) => match port {
                    None => format!("{scheme}://{label}.{host}{suffix}"),
                    Some(port) => format!("{scheme}://{label}.{host}:{port}{suffix}"),
                },
                _ => format!("{origin}/{label}{suffix}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use waygate_core::ContentReference;

    use super::{build_content_url, split_origin};

    const SAMPLE: &str = "AAocz1fpnnc9OMAHkbB5ehdLdiiHZcPP3Jl0NWiuMeg";

    #[test]
    fn splits_origins() {
        assert_eq!(
            split_origin("https://gw.example"),
            Some(("https", "gw.example", None))
        );
        assert_eq!(
            split_origin("http://gw.example:8080"),
            Some(("http", "gw.example", Some(8080)))
        );
        assert_eq!(split_origin("gw.example"), None);
        assert_eq!(split_origin("https://gw.example/path"), None);
    }

    #[test]
    fn id_uses_path_form() {
        let reference: ContentReference = SAMPLE.parse().expect("parse");
        assert_eq!(
            build_content_url("https://gw.example", &reference),
            format!("https://gw.example/{SAMPLE}")
        );
    }

    #[test]
    fn id_with_path_appends_path() {
        let reference: ContentReference = format!("{SAMPLE}/app/index.html").parse().unwrap();
        assert_eq!(
            build_content_url("https://gw.example/", &reference),
            format!("https://gw.example/{SAMPLE}/app/index.html")
        );
    }

    #[test]
    fn valid_name_uses_subdomain_form() {
        let reference = ContentReference::name("ardrive", Some("logo.svg".to_string()));
        assert_eq!(
            build_content_url("https://gw.example", &reference),
            "https://ardrive.gw.example/logo.svg"
        );
        assert_eq!(
            build_content_url("http://gw.example:8080", &reference),
            "http://ardrive.gw.example:8080/logo.svg"
        );
    }

    #[test]
    fn invalid_label_falls_back_to_path_form() {
        let reference = ContentReference::name("not_a_label", None);
        assert_eq!(
            build_content_url("https://gw.example", &reference),
            "https://gw.example/not_a_label"
        );
    }
}
