use scraper::{Html, Selector};
use url::Url;

/// The fixed table of attributes that carry URLs, and the tags they are
/// read from. Anything outside this table is not a hyperlink for our
/// purposes (CSS url() references and srcset are out of scope).
const LINK_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("background", &["body"]),
    ("cite", &["blockquote", "del", "ins", "q"]),
    ("data", &["object"]),
    ("href", &["a", "area", "embed", "link"]),
    ("icon", &["command"]),
    ("longdesc", &["frame", "iframe"]),
    ("manifest", &["html"]),
    ("pluginspage", &["embed"]),
    ("pluginurl", &["embed"]),
    ("poster", &["video"]),
    (
        "src",
        &[
            "audio", "embed", "frame", "iframe", "img", "input", "script", "source", "track",
            "video",
        ],
    ),
];

/// A link as found in a document: the attribute value verbatim, plus its
/// resolution against the page URL (None when resolution failed).
#[derive(Debug, Clone)]
pub struct ExtractedLink {
    pub original_href: String,
    pub url: Option<Url>,
}

/// Extract all URL-bearing attribute values from an HTML document.
///
/// The document is parsed once with a lenient parser; each entry of the
/// extraction table is then evaluated as a CSS selector. Values are
/// resolved against `base` and have their fragment cleared. Duplicates
/// are kept; the visit cache deduplicates later.
pub fn extract_links(html_body: &str, base: &Url) -> Vec<ExtractedLink> {
    let document = Html::parse_document(html_body);
    let mut links = Vec::new();

    for &(attribute, tags) in LINK_ATTRIBUTES {
        let selector_src = tags
            .iter()
            .map(|tag| format!("{}[{}]", tag, attribute))
            .collect::<Vec<_>>()
            .join(", ");
        let selector = Selector::parse(&selector_src).expect("Invalid CSS selector");

        for element in document.select(&selector) {
            let Some(value) = element.value().attr(attribute) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            let url = base.join(value).ok().map(|mut resolved| {
                resolved.set_fragment(None);
                resolved
            });

            links.push(ExtractedLink {
                original_href: value.to_string(),
                url,
            });
        }
    }

    links
}
