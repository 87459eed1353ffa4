use anyhow::Error;
use trickle_http::{
    Body, BodyMaterializer, BodyProgress, BodyStrategy, ByteBuffer, Charset, Config, Decoder,
    EngineError, Fill, Header, HeaderName, Status, TextBody,
};
use tracing_test::traced_test;

fn fill(bytes: &mut ByteBuffer, data: &[u8]) -> Result<Fill, Error> {
    let mut source = data;
    Ok(bytes.fill(&mut source)?)
}

#[test]
#[traced_test]
fn buffer_fill_and_take() -> Result<(), Error> {
    let mut bytes = ByteBuffer::new(8, 8, 1);

    assert_eq!(fill(&mut bytes, b"abcdefghij")?, Fill::Read(8));
    assert_eq!(bytes.unconsumed(), b"abcdefgh");
    assert_eq!(bytes.take(3), b"abc");
    assert_eq!(bytes.unconsumed(), b"defgh");
    assert_eq!(bytes.total_read(), 8);

    // Compacting keeps the unconsumed bytes in order
    bytes.compact();
    assert_eq!(bytes.unconsumed(), b"defgh");
    assert_eq!(bytes.writable(), 3);

    assert_eq!(fill(&mut bytes, b"ij")?, Fill::Read(2));
    assert_eq!(bytes.unconsumed(), b"defghij");

    assert_eq!(fill(&mut bytes, b"")?, Fill::Eof);
    assert!(bytes.is_eof());

    Ok(())
}

#[test]
#[traced_test]
fn buffer_grows_up_to_limit() -> Result<(), Error> {
    let mut bytes = ByteBuffer::new(4, 16, 4);

    assert_eq!(fill(&mut bytes, b"abcd")?, Fill::Read(4));
    assert_eq!(fill(&mut bytes, b"efgh")?, Fill::Read(4));
    assert_eq!(bytes.capacity(), 8);

    assert_eq!(fill(&mut bytes, b"ijklmnop")?, Fill::Read(8));
    assert_eq!(bytes.unconsumed(), b"abcdefghijklmnop");
    assert_eq!(bytes.capacity(), 16);

    let result = bytes.fill(&mut &b"q"[..]);
    assert!(matches!(result, Err(EngineError::BufferLimit { limit: 16 })));

    bytes.reset();
    assert_eq!(bytes.capacity(), 4);
    assert_eq!(bytes.total_read(), 0);
    assert!(!bytes.has_unconsumed());

    Ok(())
}

#[test]
#[traced_test]
fn decoder_maps_bytes_to_chars() -> Result<(), Error> {
    let mut bytes = ByteBuffer::new(16, 16, 1);
    let mut decoder = Decoder::new(4);

    fill(&mut bytes, b"a\xe9\xffbc")?;
    assert_eq!(decoder.decode(&mut bytes)?, 4);
    assert_eq!(decoder.remaining(), &['a', '\u{e9}', '\u{ff}', 'b']);

    // A full window decodes nothing until chars are consumed
    assert_eq!(decoder.decode(&mut bytes)?, 0);

    assert_eq!(decoder.next_char(), Some('a'));
    decoder.advance(2);
    assert_eq!(decoder.decode(&mut bytes)?, 1);
    assert_eq!(decoder.remaining(), &['b', 'c']);
    assert_eq!(decoder.position().bytes_decoded, 5);
    assert!(decoder.position().bytes_decoded <= bytes.total_read());

    assert!(!decoder.is_end_of_input(&bytes));
    fill(&mut bytes, b"")?;
    assert!(!decoder.is_end_of_input(&bytes));
    decoder.advance(2);
    assert!(decoder.is_end_of_input(&bytes));

    Ok(())
}

#[test]
#[traced_test]
fn decoded_chars_round_trip_to_bytes() -> Result<(), Error> {
    let source: Vec<u8> = (0..=255).collect();
    let mut bytes = ByteBuffer::new(256, 256, 1);
    let mut decoder = Decoder::new(256);

    fill(&mut bytes, &source)?;
    decoder.decode(&mut bytes)?;

    let mut out: Vec<u8> = Vec::new();
    assert_eq!(decoder.take_bytes(usize::MAX, &mut out), 256);
    assert_eq!(out, source);

    Ok(())
}

#[test]
#[traced_test]
fn body_stops_at_content_length() -> Result<(), Error> {
    let mut bytes = ByteBuffer::new(32, 32, 1);
    let mut decoder = Decoder::new(8);
    let mut body = BodyMaterializer::default();

    // The window holds the start of the body and of the next request
    fill(&mut bytes, b"helloGET / HTTP/1.1")?;
    decoder.decode(&mut bytes)?;

    body.start(BodyStrategy::Text {
        length: 5,
        charset: Charset::Utf8,
    });
    assert_eq!(body.read(&mut decoder, &mut bytes), BodyProgress::Complete);
    assert_eq!(body.remaining(), 0);

    assert_eq!(decoder.remaining(), &['G', 'E', 'T']);
    assert_eq!(bytes.unconsumed(), b" / HTTP/1.1");
    assert_eq!(body.finish(), Ok(Body::Text(TextBody::new(Charset::Utf8, "hello"))));

    Ok(())
}

#[test]
#[traced_test]
fn body_spans_window_and_buffer() -> Result<(), Error> {
    let mut bytes = ByteBuffer::new(32, 32, 1);
    let mut decoder = Decoder::new(4);
    let mut body = BodyMaterializer::default();

    fill(&mut bytes, b"0123456789XYZ")?;
    decoder.decode(&mut bytes)?;

    body.start(BodyStrategy::Bytes { length: 10 });
    assert_eq!(body.read(&mut decoder, &mut bytes), BodyProgress::Complete);
    assert_eq!(bytes.unconsumed(), b"XYZ");

    let result = body.finish();
    assert_eq!(result, Ok(Body::Bytes("0123456789".into())));

    Ok(())
}

#[test]
#[traced_test]
fn body_suspends_until_complete() -> Result<(), Error> {
    let mut bytes = ByteBuffer::new(32, 32, 1);
    let mut decoder = Decoder::new(32);
    let mut body = BodyMaterializer::default();
    body.start(BodyStrategy::Bytes { length: 5 });

    fill(&mut bytes, b"hel")?;
    assert_eq!(body.read(&mut decoder, &mut bytes), BodyProgress::NeedInput);
    assert_eq!(body.remaining(), 2);

    fill(&mut bytes, b"loGET")?;
    assert_eq!(body.read(&mut decoder, &mut bytes), BodyProgress::Complete);
    assert_eq!(bytes.unconsumed(), b"GET");

    Ok(())
}

#[test]
#[traced_test]
fn body_truncated_at_eof() -> Result<(), Error> {
    let mut bytes = ByteBuffer::new(32, 32, 1);
    let mut decoder = Decoder::new(32);
    let mut body = BodyMaterializer::default();
    body.start(BodyStrategy::Bytes { length: 5 });

    fill(&mut bytes, b"he")?;
    fill(&mut bytes, b"")?;
    assert_eq!(body.read(&mut decoder, &mut bytes), BodyProgress::Truncated);

    Ok(())
}

#[test]
#[traced_test]
fn body_strategy_negotiation() {
    let config = Config::default();
    let length = |value: &str| {
        Header::new(
            HeaderName::new("content-length"),
            value,
            trickle_http::header::HeaderValue::ContentLength(value.parse().unwrap_or_default()),
        )
    };

    assert_eq!(
        BodyStrategy::negotiate(&[Header::raw("host", "x")], &config),
        Ok(BodyStrategy::Ignored)
    );
    assert_eq!(
        BodyStrategy::negotiate(&[length("0")], &config),
        Ok(BodyStrategy::Text {
            length: 0,
            charset: Charset::Utf8
        })
    );
    assert_eq!(
        BodyStrategy::negotiate(&[length("3")], &config),
        Ok(BodyStrategy::Text {
            length: 3,
            charset: Charset::Utf8
        })
    );
    assert_eq!(
        BodyStrategy::negotiate(&[length("3"), length("4")], &config),
        Err(Status::BadRequest)
    );
    assert_eq!(
        BodyStrategy::negotiate(&[length("3"), Header::raw("transfer-encoding", "gzip")], &config),
        Err(Status::NotImplemented)
    );

    let config = Config::default().with_max_body_length(2);
    assert_eq!(
        BodyStrategy::negotiate(&[length("3")], &config),
        Err(Status::ContentTooLarge)
    );
}

#[test]
#[traced_test]
fn charsets_decode() {
    assert_eq!(Charset::from_label("UTF-8"), Some(Charset::Utf8));
    assert_eq!(Charset::from_label("latin1"), Some(Charset::Iso8859_1));
    assert_eq!(Charset::from_label("US-ASCII"), Some(Charset::UsAscii));
    assert_eq!(Charset::from_label("shift_jis"), None);

    assert_eq!(Charset::Utf8.decode("h\u{e9}".as_bytes()).as_deref(), Some("h\u{e9}"));
    assert_eq!(Charset::Utf8.decode(b"\xff"), None);
    assert_eq!(Charset::Iso8859_1.decode(b"h\xe9").as_deref(), Some("h\u{e9}"));
    assert_eq!(Charset::UsAscii.decode(b"h\xe9"), None);
}
