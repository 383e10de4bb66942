use pulldown_cmark::{CowStr, Event, Options as CmarkOptions, Parser, Tag};

const ALLOWED_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// True for relative URLs and the schemes in [`ALLOWED_SCHEMES`].
fn is_safe_url(url: &str) -> bool {
    let url = url.trim();
    match url.find([':', '/', '?', '#']) {
        Some(i) if url[i..].starts_with(':') => {
            let scheme = url[..i].to_ascii_lowercase();
            ALLOWED_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    if is_safe_url(&url) { url } else { CowStr::Borrowed("#") }
}

/// Renders a free-text field (description, preconditions, defect report) to HTML.
///
/// Raw HTML written by users is shown as text, never injected. Link and
/// image targets with other schemes (`javascript:`, `data:`, ...) become `#`.
pub fn render(markdown_input: &str) -> String {
    let mut options = CmarkOptions::empty();
    options.insert(CmarkOptions::ENABLE_TABLES);
    options.insert(CmarkOptions::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown_input, options).map(|event| match event {
        Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image { link_type, dest_url, title, id }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    html_output
}

/// Like [`render`], but `None`/blank renders as an empty string.
pub fn render_opt(text: Option<&str>) -> String {
    match text {
        Some(t) if !t.trim().is_empty() => render(t),
        _ => String::new(),
    }
}
