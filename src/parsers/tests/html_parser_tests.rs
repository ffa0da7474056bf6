use crate::parsers::{Parser, html};
use url::Url;

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://academy.example.com/learning/megacombo").unwrap()
    }

    #[test]
    fn test_relative_and_absolute_links() {
        let page = r#"<html><head><title> Course
            Catalog </title></head><body>
            <a href="/learning/megacombo/0a1b2c3d-4e5f-6789-abcd-ef0123456789">Bundle</a>
            <a href="notes.pdf">Notes</a>
            <a href="https://cdn.example.com/x.pdf?sig=1">CDN</a>
        </body></html>"#;

        let result = Parser::parse(page, &base());
        assert_eq!(result.title.as_deref(), Some("Course Catalog"));

        let links: Vec<&str> = result.links.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://academy.example.com/learning/megacombo/0a1b2c3d-4e5f-6789-abcd-ef0123456789",
                "https://academy.example.com/learning/notes.pdf",
                "https://cdn.example.com/x.pdf?sig=1",
            ]
        );
    }

    #[test]
    fn test_skips_anchors_scripts_and_empty() {
        let page = r##"<body>
            <a href="#top">Top</a>
            <a href="javascript:void(0)">Menu</a>
            <a href="">Empty</a>
            <a>No href</a>
            <a href="/learning">Learning</a>
        </body>"##;

        let links = html::parse_links_only(page, &base());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].as_str(), "https://academy.example.com/learning");
    }

    #[test]
    fn test_deduplicates_links() {
        let page = r#"<body>
            <a href="/a">One</a><a href="/a">Again</a>
            <a href="https://academy.example.com/a">Absolute</a>
        </body>"#;

        let links = html::parse_links_only(page, &base());
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_missing_title() {
        let result = Parser::parse("<body><p>No head</p></body>", &base());
        assert!(result.title.is_none());
        assert!(result.links.is_empty());
    }
}
