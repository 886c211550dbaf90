/// Reduce an HTML fragment to the text a search engine should tokenize.
///
/// Tags are dropped (`script`/`style` together with their content) and every
/// tag boundary becomes a word boundary, so `<p>a</p><p>b</p>` yields two
/// tokens rather than `ab`.
pub fn html_to_text(html: &str) -> String {
    let spaced = html.replace('>', "> ");
    let cleaned = ammonia::Builder::empty().clean(&spaced).to_string();

    let unescaped = cleaned
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    unescaped.split_whitespace().collect::<Vec<_>>().join(" ")
}
