//! WSRP consumer URLs.
//!
//! A producer that cannot build consumer URLs itself emits
//! `wsrp_rewrite?<params>/wsrp_rewrite` tokens. The parameters are parsed
//! into a [`WsrpUrl`] and handed to the container's
//! [`UrlGenerator`](crate::container::UrlGenerator).

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("missing wsrp-urlType")]
    MissingType,
    #[error("unknown wsrp-urlType '{0}'")]
    UnknownType(String),
    #[error("malformed parameter '{0}'")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlType {
    Render,
    BlockingAction,
    Resource,
}

impl UrlType {
    pub fn as_str(self) -> &'static str {
        match self {
            UrlType::Render => "render",
            UrlType::BlockingAction => "blockingAction",
            UrlType::Resource => "resource",
        }
    }
}

impl FromStr for UrlType {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "render" => Ok(UrlType::Render),
            "blockingAction" => Ok(UrlType::BlockingAction),
            "resource" => Ok(UrlType::Resource),
            other => Err(UrlError::UnknownType(other.to_owned())),
        }
    }
}

impl fmt::Display for UrlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed parameters of a rewrite URL token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsrpUrl {
    pub url_type: UrlType,
    pub mode: Option<String>,
    pub window_state: Option<String>,
    pub navigational_state: Option<String>,
    pub interaction_state: Option<String>,
    pub resource_id: Option<String>,
    pub resource_url: Option<String>,
    pub resource_state: Option<String>,
    pub secure: bool,
    pub requires_rewrite: bool,
    pub fragment_id: Option<String>,
    /// Parameters outside the `wsrp-` set, in order of appearance.
    pub extra: Vec<(String, String)>,
}

impl WsrpUrl {
    pub fn new(url_type: UrlType) -> Self {
        Self {
            url_type,
            mode: None,
            window_state: None,
            navigational_state: None,
            interaction_state: None,
            resource_id: None,
            resource_url: None,
            resource_state: None,
            secure: false,
            requires_rewrite: false,
            fragment_id: None,
            extra: Vec::new(),
        }
    }

    /// Parse the text between the rewrite token boundaries. Both `&` and
    /// `&amp;` separate parameters; keys and values are percent-decoded.
    pub fn parse(params: &str) -> Result<Self, UrlError> {
        let params = params.replace("&amp;", "&");
        let mut url_type = None;
        let mut url = WsrpUrl::new(UrlType::Render);

        for pair in params.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| UrlError::Malformed(pair.to_owned()))?;
            let key = decode(key, pair)?;
            let value = decode(value, pair)?.into_owned();

            match key.as_ref() {
                "wsrp-urlType" => url_type = Some(value.parse::<UrlType>()?),
                "wsrp-mode" => url.mode = Some(value),
                "wsrp-windowState" => url.window_state = Some(value),
                "wsrp-navigationalState" => url.navigational_state = Some(value),
                "wsrp-interactionState" => url.interaction_state = Some(value),
                "wsrp-resourceID" => url.resource_id = Some(value),
                "wsrp-url" => url.resource_url = Some(value),
                "wsrp-resourceState" => url.resource_state = Some(value),
                "wsrp-secureURL" => url.secure = value.eq_ignore_ascii_case("true"),
                "wsrp-requiresRewrite" => {
                    url.requires_rewrite = value.eq_ignore_ascii_case("true")
                }
                "wsrp-fragmentID" => url.fragment_id = Some(value),
                _ => url.extra.push((key.into_owned(), value)),
            }
        }

        url.url_type = url_type.ok_or(UrlError::MissingType)?;
        Ok(url)
    }

    /// Percent-encoded `key=value&...` form, `wsrp-urlType` first.
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<(&str, Cow<'_, str>)> =
            vec![("wsrp-urlType", Cow::Borrowed(self.url_type.as_str()))];
        let optional = [
            ("wsrp-mode", &self.mode),
            ("wsrp-windowState", &self.window_state),
            ("wsrp-navigationalState", &self.navigational_state),
            ("wsrp-interactionState", &self.interaction_state),
            ("wsrp-resourceID", &self.resource_id),
            ("wsrp-url", &self.resource_url),
            ("wsrp-resourceState", &self.resource_state),
            ("wsrp-fragmentID", &self.fragment_id),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                pairs.push((key, Cow::Borrowed(value.as_str())));
            }
        }
        if self.secure {
            pairs.push(("wsrp-secureURL", Cow::Borrowed("true")));
        }
        if self.requires_rewrite {
            pairs.push(("wsrp-requiresRewrite", Cow::Borrowed("true")));
        }
        for (key, value) in &self.extra {
            pairs.push((key.as_str(), Cow::Borrowed(value.as_str())));
        }

        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn decode<'a>(raw: &'a str, pair: &str) -> Result<Cow<'a, str>, UrlError> {
    urlencoding::decode(raw).map_err(|_| UrlError::Malformed(pair.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_render_url_with_amp_entities() {
        let url = WsrpUrl::parse(
            "wsrp-urlType=render&amp;wsrp-mode=wsrp%3Aedit&amp;wsrp-navigationalState=a%20b&custom=1",
        )
        .unwrap();
        assert_eq!(url.url_type, UrlType::Render);
        assert_eq!(url.mode.as_deref(), Some("wsrp:edit"));
        assert_eq!(url.navigational_state.as_deref(), Some("a b"));
        assert_eq!(url.extra, vec![("custom".to_string(), "1".to_string())]);
    }

    #[test]
    fn parses_resource_flags() {
        let url = WsrpUrl::parse(
            "wsrp-urlType=resource&wsrp-url=http%3A%2F%2Fx%2Fimg.png&wsrp-secureURL=true&wsrp-requiresRewrite=false",
        )
        .unwrap();
        assert_eq!(url.url_type, UrlType::Resource);
        assert_eq!(url.resource_url.as_deref(), Some("http://x/img.png"));
        assert!(url.secure);
        assert!(!url.requires_rewrite);
    }

    #[test]
    fn rejects_missing_or_unknown_type() {
        assert_eq!(WsrpUrl::parse("wsrp-mode=view"), Err(UrlError::MissingType));
        assert_eq!(
            WsrpUrl::parse("wsrp-urlType=teleport"),
            Err(UrlError::UnknownType("teleport".into()))
        );
        assert!(matches!(
            WsrpUrl::parse("wsrp-urlType"),
            Err(UrlError::Malformed(_))
        ));
    }

    #[test]
    fn query_string_encodes_values() {
        let mut url = WsrpUrl::new(UrlType::BlockingAction);
        url.interaction_state = Some("x y".into());
        url.secure = true;
        assert_eq!(
            url.to_query_string(),
            "wsrp-urlType=blockingAction&wsrp-interactionState=x%20y&wsrp-secureURL=true"
        );
    }
}
