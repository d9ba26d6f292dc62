//! Editor resources (icon sprite, style sheet, locale strings) loaded
//! concurrently before the editor becomes interactive.

use crate::config::EditorOptions;
use crate::error::FormResult;
use std::collections::BTreeMap;

/// Known-good sprite location used when the configured one fails.
pub const SPRITE_FALLBACK: &str = "https://formstage.dev/assets/img/formstage-sprite.svg";

/// Fetches a resource body by location.
#[allow(async_fn_in_trait)]
pub trait ResourceLoader {
    async fn fetch(&self, location: &str) -> FormResult<String>;
}

/// Where each resource comes from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePlan {
    pub sprite: Option<String>,
    pub sprite_fallback: Option<String>,
    pub style: Option<String>,
    pub locale: Option<String>,
}

impl ResourcePlan {
    pub fn from_options(options: &EditorOptions) -> Self {
        ResourcePlan {
            sprite: options.svg_sprite.clone(),
            sprite_fallback: options.svg_sprite.as_ref().map(|_| SPRITE_FALLBACK.to_string()),
            style: options.style.clone(),
            locale: options.i18n.location.as_ref().map(|loc| {
                format!("{}/{}.lang", loc.trim_end_matches('/'), options.i18n.locale)
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    pub sprite: Option<String>,
    pub sprite_from_fallback: bool,
    pub style: Option<String>,
    pub strings: BTreeMap<String, String>,
}

impl Resources {
    /// Localized string for `key`, or the key itself.
    pub fn t<'a>(&'a self, key: &'a str) -> &'a str {
        self.strings.get(key).map(String::as_str).unwrap_or(key)
    }
}

/// Parse `key = value` lines; blank lines and `#` comments are skipped.
pub fn parse_lang(body: &str) -> BTreeMap<String, String> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

async fn fetch_optional<L: ResourceLoader>(loader: &L, location: Option<&str>) -> Option<String> {
    let location = location?;
    match loader.fetch(location).await {
        Ok(body) => Some(body),
        Err(e) => {
            tracing::warn!(location, error = %e, "resource unavailable");
            None
        }
    }
}

async fn fetch_with_fallback<L: ResourceLoader>(
    loader: &L,
    primary: Option<&str>,
    fallback: Option<&str>,
) -> (Option<String>, bool) {
    if let Some(body) = fetch_optional(loader, primary).await {
        return (Some(body), false);
    }
    if primary.is_some() {
        if let Some(fallback) = fallback {
            tracing::warn!(fallback, "using fallback resource location");
            let body = fetch_optional(loader, Some(fallback)).await;
            let used = body.is_some();
            return (body, used);
        }
    }
    (None, false)
}

/// Load everything in `plan` concurrently. Failures degrade to `None`.
pub async fn load_resources<L: ResourceLoader>(loader: &L, plan: &ResourcePlan) -> Resources {
    let ((sprite, sprite_from_fallback), style, locale) = tokio::join!(
        fetch_with_fallback(loader, plan.sprite.as_deref(), plan.sprite_fallback.as_deref()),
        fetch_optional(loader, plan.style.as_deref()),
        fetch_optional(loader, plan.locale.as_deref()),
    );
    Resources {
        sprite,
        sprite_from_fallback,
        style,
        strings: locale.as_deref().map(parse_lang).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormError;
    use std::collections::HashMap;

    struct MapLoader(HashMap<String, String>);

    impl ResourceLoader for MapLoader {
        async fn fetch(&self, location: &str) -> FormResult<String> {
            self.0
                .get(location)
                .cloned()
                .ok_or_else(|| FormError::ResourceUnavailable {
                    location: location.to_string(),
                    reason: "not found".to_string(),
                })
        }
    }

    #[tokio::test]
    async fn test_sprite_falls_back() {
        let loader = MapLoader(HashMap::from([
            (SPRITE_FALLBACK.to_string(), "<svg/>".to_string()),
            ("style.css".to_string(), "body{}".to_string()),
        ]));
        let plan = ResourcePlan {
            sprite: Some("missing.svg".into()),
            sprite_fallback: Some(SPRITE_FALLBACK.into()),
            style: Some("style.css".into()),
            locale: Some("lang/en-US.lang".into()),
        };
        let res = load_resources(&loader, &plan).await;
        assert_eq!(res.sprite.as_deref(), Some("<svg/>"));
        assert!(res.sprite_from_fallback);
        assert_eq!(res.style.as_deref(), Some("body{}"));
        assert!(res.strings.is_empty());
    }

    #[test]
    fn test_parse_lang() {
        let strings = parse_lang("# comment\naddOption = Add Option\n\nsave=Save\n");
        assert_eq!(strings.len(), 2);
        let res = Resources {
            strings,
            ..Default::default()
        };
        assert_eq!(res.t("save"), "Save");
        assert_eq!(res.t("unknown"), "unknown");
    }

    #[test]
    fn test_plan_from_options() {
        let mut options = EditorOptions::default();
        options.i18n.location = Some("https://cdn.example/lang/".into());
        let plan = ResourcePlan::from_options(&options);
        assert_eq!(plan.locale.as_deref(), Some("https://cdn.example/lang/en-US.lang"));
        assert!(plan.sprite.is_none() && plan.sprite_fallback.is_none());
    }
}
