use trickle_http::header::{
    ContentLengthParser, ContentTypeParser, Cookie, CookieParser, HeaderName, HeaderParser,
    HeaderRegistry, HeaderValue, Interner, MediaType, RawParser,
};
use trickle_http::Header;
use tracing_test::traced_test;

/// Feed a full value line, including CRLF, returning the header if it wasn't malformed.
fn parse(mut parser: Box<dyn HeaderParser>, line: &str) -> Option<Header> {
    for c in line.chars() {
        if !parser.should_consume() {
            break;
        }
        parser.consume(c);
    }

    if parser.is_malformed() {
        return None;
    }

    assert!(!parser.should_consume(), "parser still consuming");
    Some(parser.build(HeaderName::new("test")))
}

fn cookie(line: &str) -> Option<Header> {
    parse(Box::new(CookieParser::default()), line)
}

#[test]
#[traced_test]
fn cookie_pairs() {
    let header = cookie("a=b; c=\"d\";e=f \r\n").expect("valid cookie");

    assert_eq!(
        header.cookies(),
        &[
            Cookie::new("a", "b"),
            Cookie::new("c", "d"),
            Cookie::new("e", "f")
        ]
    );
    assert_eq!(header.as_str(), "a=b; c=\"d\";e=f");
}

#[test]
#[traced_test]
fn cookie_malformed() {
    let lines = [
        "a=b; =bad\r\n",
        "=b\r\n",
        "a\r\n",
        "a=b c\r\n",
        "a=\"b\r\n",
        "a=b\\c\r\n",
        "a=b\rx",
        "a=b;;c=d\r\n",
    ];

    for line in lines {
        assert_eq!(cookie(line), None, "accepted {:?}", line);
    }
}

#[test]
#[traced_test]
fn content_length_digits() {
    let header = parse(Box::new(ContentLengthParser::default()), "1234 \r\n").expect("valid");
    assert_eq!(header.content_length(), Some(1234));
    assert_eq!(header.as_str(), "1234");

    let max = format!("{}\r\n", u64::MAX);
    let header = parse(Box::new(ContentLengthParser::default()), &max).expect("valid");
    assert_eq!(header.content_length(), Some(u64::MAX));
}

#[test]
#[traced_test]
fn content_length_malformed() {
    let overflow = format!("{}0\r\n", u64::MAX);
    let lines = ["\r\n", "-1\r\n", "12a\r\n", "1 2\r\n", "0x10\r\n", overflow.as_str()];

    for line in lines {
        let header = parse(Box::new(ContentLengthParser::default()), line);
        assert_eq!(header, None, "accepted {:?}", line);
    }
}

#[test]
#[traced_test]
fn content_type_media_type() {
    let line = "Text/HTML; Charset=\"UTF-8\" ; q=1\r\n";
    let header = parse(Box::new(ContentTypeParser::default()), line).expect("valid");

    let media_type = header.media_type().expect("media type");
    assert_eq!(media_type.kind(), "text");
    assert_eq!(media_type.subtype(), "html");
    assert_eq!(media_type.charset(), Some("UTF-8"));
    assert_eq!(media_type.parameter("Q"), Some("1"));
    assert!(media_type.is_text());

    let expected = MediaType::new("text", "html")
        .with_parameter("charset", "UTF-8")
        .with_parameter("q", "1");
    assert_eq!(header.value(), &HeaderValue::ContentType(expected));
}

#[test]
#[traced_test]
fn content_type_text_detection() {
    let cases = [
        ("application/json\r\n", true),
        ("application/octet-stream\r\n", false),
        ("image/png\r\n", false),
        ("text/csv\r\n", true),
    ];

    for (line, text) in cases {
        let header = parse(Box::new(ContentTypeParser::default()), line).expect("valid");
        let media_type = header.media_type().expect("media type");

        assert_eq!(media_type.is_text(), text, "{}", media_type);
    }
}

#[test]
#[traced_test]
fn content_type_malformed() {
    let lines = ["text\r\n", "/plain\r\n", "text/\r\n", "text/plain; charset\r\n", "text/plain x\r\n"];

    for line in lines {
        let header = parse(Box::new(ContentTypeParser::default()), line);
        assert_eq!(header, None, "accepted {:?}", line);
    }
}

#[test]
#[traced_test]
fn raw_value_trimmed() {
    let header = parse(Box::new(RawParser::default()), "a b\t \r\n").expect("valid");
    assert_eq!(header.as_str(), "a b");
    assert_eq!(header.value(), &HeaderValue::Raw);

    // obs-text is kept as is
    let header = parse(Box::new(RawParser::default()), "caf\u{e9}\r\n").expect("valid");
    assert_eq!(header.as_str(), "caf\u{e9}");

    assert_eq!(parse(Box::new(RawParser::default()), "a\x7fb\r\n"), None);
    assert_eq!(parse(Box::new(RawParser::default()), "a\nb\r\n"), None);
}

#[test]
#[traced_test]
fn registry_resolves_names() {
    let registry = HeaderRegistry::standard();
    let mut interner = Interner::default();

    assert!(registry.contains("cookie"));
    assert!(registry.contains("host"));
    assert!(!registry.contains("x-custom"));

    let (first, _) = registry.resolve("host", &mut interner);
    let (second, _) = registry.resolve("host", &mut interner);
    assert!(first.ptr_eq(&second));
    assert!(interner.is_empty());

    let (first, _) = registry.resolve("x-custom", &mut interner);
    let (second, _) = registry.resolve("x-custom", &mut interner);
    assert_eq!(first, "x-custom");
    assert!(first.ptr_eq(&second));
    assert_eq!(interner.len(), 1);
}

#[test]
#[traced_test]
fn registry_dispatches_sub_parsers() {
    let registry = HeaderRegistry::standard();
    let mut interner = Interner::default();

    let (name, parser) = registry.resolve("content-length", &mut interner);
    let header = parse(parser, "42\r\n").expect("valid");
    assert_eq!(header.content_length(), Some(42));
    assert_eq!(name, "content-length");

    // Without a registration the value stays raw
    let registry = HeaderRegistry::empty();
    let (_, parser) = registry.resolve("content-length", &mut interner);
    let header = parse(parser, "42\r\n").expect("valid");
    assert_eq!(header.content_length(), None);
    assert_eq!(header.as_str(), "42");
}

#[test]
#[traced_test]
fn registry_custom_parser() {
    let mut registry = HeaderRegistry::empty();
    registry.register("X-Length", || Box::new(ContentLengthParser::default()));
    let mut interner = Interner::default();

    assert!(registry.contains("x-length"));

    let (_, parser) = registry.resolve("x-length", &mut interner);
    assert_eq!(parse(parser, "abc\r\n"), None);
}
