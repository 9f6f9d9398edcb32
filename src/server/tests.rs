//! Tests for the HTTP server implementation.

#[cfg(test)]
mod server_tests {
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::{Duration, Instant};

    use serde::Serialize;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
    use tokio::net::{TcpListener, TcpStream};

    use crate::parser::{Error as ParserError, Method};
    use crate::server::{Error, HttpResponse, HttpServer, Router, ServerConfig, StatusCode};

    // Mock TcpStream for testing
    struct MockTcpStream {
        read_data: Cursor<Vec<u8>>,
        write_data: Vec<u8>,
        read_chunk: usize,
        write_chunk: usize,
        shutdowns: usize,
    }

    impl MockTcpStream {
        fn new(read_data: impl Into<Vec<u8>>) -> Self {
            Self {
                read_data: Cursor::new(read_data.into()),
                write_data: Vec::new(),
                read_chunk: usize::MAX,
                write_chunk: usize::MAX,
                shutdowns: 0,
            }
        }

        fn with_read_chunk(mut self, chunk: usize) -> Self {
            self.read_chunk = chunk;
            self
        }

        fn with_write_chunk(mut self, chunk: usize) -> Self {
            self.write_chunk = chunk;
            self
        }

        fn written(&self) -> String {
            String::from_utf8_lossy(&self.write_data).into_owned()
        }
    }

    impl AsyncRead for MockTcpStream {
        fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let limit = this.read_chunk.min(buf.remaining());
            let mut tmp = vec![0; limit];
            let n = std::io::Read::read(&mut this.read_data, &mut tmp)?;
            buf.put_slice(&tmp[..n]);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTcpStream {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            let n = this.write_chunk.min(buf.len());
            this.write_data.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.get_mut().shutdowns += 1;
            Poll::Ready(Ok(()))
        }
    }

    fn echo_router() -> Arc<Router> {
        let mut router = Router::new();
        router.register(Method::POST, "/echo", |req, res| {
            res.set_body(req.body.clone());
        });
        router.register(Method::GET, "/hello", |_req, res| {
            res.set_body("Hello, World!");
        });
        Arc::new(router)
    }

    async fn serve_mock(stream: &mut MockTcpStream) -> Result<usize, Error> {
        HttpServer::handle_connection(stream, echo_router(), &ServerConfig::default()).await
    }

    #[test]
    fn test_reregistration_replaces_handler() {
        let mut router = Router::new();
        router.register(Method::GET, "/a", |_req, res| res.set_body("first"));
        router.register(Method::GET, "/a", |_req, res| res.set_body("second"));
        assert_eq!(router.len(), 1);

        let request = crate::parser::parse_request(b"GET /a HTTP/1.1\r\n\r\n").unwrap();
        let handler = router.resolve(Method::GET, "/a").unwrap();
        let mut response = HttpResponse::default();
        handler(&request, &mut response);
        assert_eq!(response.body, b"second");
    }

    #[test]
    fn test_resolve_is_exact_match_per_method() {
        let router = echo_router();
        assert!(router.resolve(Method::POST, "/echo").is_ok());
        assert!(matches!(router.resolve(Method::GET, "/echo"), Err(Error::NotFound(Method::GET, _))));
        assert!(matches!(router.resolve(Method::POST, "/echo/"), Err(Error::NotFound(_, _))));
        assert!(matches!(router.resolve(Method::GET, "/hello?x=1"), Err(Error::NotFound(_, _))));
        assert!(matches!(router.resolve(Method::Unsupported, "/echo"), Err(Error::UnsupportedMethod(_))));
    }

    #[test]
    fn test_unsupported_method_cannot_be_registered() {
        let mut router = Router::new();
        assert!(!router.register(Method::Unsupported, "/x", |_req, _res| {}));
        assert!(router.is_empty());
    }

    #[test]
    fn test_routes_listing() {
        let router = echo_router();
        assert_eq!(router.routes(), vec![(Method::GET, "/hello"), (Method::POST, "/echo")]);
    }

    #[test]
    fn test_server_route_registration() {
        let mut server = HttpServer::new(ServerConfig::default());
        server
            .register_post("/items", |_req, _res| {})
            .register_get("/items", |_req, _res| {})
            .add_route(Method::Unsupported, "/items", |_req, _res| {});

        assert_eq!(server.router().len(), 2);
        assert_eq!(server.router().routes(), vec![(Method::GET, "/items"), (Method::POST, "/items")]);
    }

    #[test]
    fn test_header_line_breaks_are_stripped() {
        let mut response = HttpResponse::default();
        response.set_header("X-A", "v\r\nSet-Cookie: evil=1");
        response.set_header("X-B\r\nX-C", "2");
        response.headers.push(("X-D".to_string(), "w\nSet-Cookie: evil=2".to_string()));

        let wire = String::from_utf8(response.serialize()).unwrap();
        assert_eq!(
            wire,
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-A: vSet-Cookie: evil=1\r\nX-BX-C: 2\r\n\
X-D: wSet-Cookie: evil=2\r\nContent-Length: 0\r\n\r\n"
        );
        assert!(!wire.contains("\nSet-Cookie"));
        assert_eq!(response.header("X-A"), Some("vSet-Cookie: evil=1"));
    }

    #[test]
    fn test_computed_content_length_wins() {
        let mut response = HttpResponse::default();
        response.set_header("Content-Length", "999");
        response.set_body("abc");

        let wire = String::from_utf8(response.serialize()).unwrap();
        assert_eq!(wire, "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 3\r\n\r\nabc");
    }

    #[test]
    fn test_append_and_replace_body() {
        let mut response = HttpResponse::default();
        response.append_to_body("a");
        response.append_to_body("b");
        assert_eq!(response.body, b"ab");

        response.set_body("c");
        assert_eq!(response.body, b"c");
    }

    #[test]
    fn test_headers_keep_order_and_last_write_wins() {
        let mut response = HttpResponse::new(StatusCode::Created);
        response.set_header("X-First", "1");
        response.set_header("X-Second", "2");
        response.set_header("x-first", "3");
        response.set_content_type("text/html");

        let wire = String::from_utf8(response.serialize()).unwrap();
        assert_eq!(
            wire,
            "HTTP/1.1 201 Created\r\nContent-Type: text/html\r\nX-First: 3\r\nX-Second: 2\r\nContent-Length: 0\r\n\r\n"
        );
        assert_eq!(response.header("X-FIRST"), Some("3"));
    }

    #[test]
    fn test_json_response() {
        #[derive(Serialize)]
        struct Status {
            ok: bool,
        }

        let mut response = HttpResponse::default();
        response.set_json(&Status { ok: true }).unwrap();
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.body, br#"{"ok":true}"#);
    }

    #[test]
    fn test_config_with_port() {
        let config = ServerConfig::with_port(9000);
        assert_eq!(config.addr, "0.0.0.0:9000".parse::<std::net::SocketAddr>().unwrap());
        assert_eq!(config.read_buffer_size, 2048);
        assert_eq!(config.max_connections, ServerConfig::default().max_connections);
    }

    #[tokio::test]
    async fn test_echo_across_single_byte_reads() {
        let mut stream = MockTcpStream::new(&b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello"[..]).with_read_chunk(1);

        let served = serve_mock(&mut stream).await.unwrap();

        assert_eq!(served, 1);
        assert_eq!(
            stream.written(),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello"
        );
        assert_eq!(stream.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_unregistered_path_gets_not_found() {
        let mut stream = MockTcpStream::new(&b"GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n"[..]);

        let served = serve_mock(&mut stream).await.unwrap();

        assert_eq!(served, 1);
        let response = stream.written();
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.ends_with("\r\n\r\nNot found: /missing"));
        assert_eq!(stream.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_keep_alive_serves_following_request() {
        let requests = b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n\
POST /echo HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc\
GET /missing HTTP/1.1\r\n\r\n";
        let mut stream = MockTcpStream::new(&requests[..]).with_read_chunk(7);

        let served = serve_mock(&mut stream).await.unwrap();

        assert_eq!(served, 3);
        let response = stream.written();
        let hello = response.find("Hello, World!").unwrap();
        let echo = response.find("Content-Length: 3\r\n\r\nabc").unwrap();
        let missing = response.find("HTTP/1.1 404 Not Found").unwrap();
        assert!(hello < echo && echo < missing);
        assert_eq!(stream.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_connection_close_ends_after_one_response() {
        let requests = b"GET /hello HTTP/1.1\r\nConnection: close\r\n\r\nGET /hello HTTP/1.1\r\n\r\n";
        let mut stream = MockTcpStream::new(&requests[..]);

        let served = serve_mock(&mut stream).await.unwrap();

        assert_eq!(served, 1);
        assert_eq!(stream.written().matches("HTTP/1.1 200 OK").count(), 1);
    }

    #[tokio::test]
    async fn test_http10_closes_by_default() {
        let requests = b"GET /hello HTTP/1.0\r\n\r\nGET /hello HTTP/1.0\r\n\r\n";
        let mut stream = MockTcpStream::new(&requests[..]);

        assert_eq!(serve_mock(&mut stream).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_request_gets_bad_request() {
        let mut stream = MockTcpStream::new(&b"GET /only-two\r\n\r\nGET /hello HTTP/1.1\r\n\r\n"[..]);

        let served = serve_mock(&mut stream).await.unwrap();

        assert_eq!(served, 1);
        let response = stream.written();
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(!response.contains("Hello, World!"));
    }

    #[tokio::test]
    async fn test_conflicting_content_lengths_get_bad_request() {
        let request = b"POST /echo HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\nabcd";
        let mut stream = MockTcpStream::new(&request[..]);

        let served = serve_mock(&mut stream).await.unwrap();

        assert_eq!(served, 1);
        let response = stream.written();
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(!response.ends_with("abc") && !response.ends_with("abcd"));
        assert_eq!(stream.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_unsupported_method_gets_not_implemented() {
        let mut stream = MockTcpStream::new(&b"DELETE /echo HTTP/1.1\r\n\r\n"[..]);

        let served = serve_mock(&mut stream).await.unwrap();

        assert_eq!(served, 1);
        let response = stream.written();
        assert!(response.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
        assert!(response.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn test_oversized_requests_are_refused() {
        let config = ServerConfig {
            max_header_size: 64,
            max_body_size: 16,
            ..ServerConfig::default()
        };

        let long_head = format!("GET /hello HTTP/1.1\r\nX-Filler: {}\r\n\r\n", "a".repeat(100));
        let mut stream = MockTcpStream::new(long_head.into_bytes()).with_read_chunk(32);
        HttpServer::handle_connection(&mut stream, echo_router(), &config).await.unwrap();
        assert!(stream.written().starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));

        let mut stream = MockTcpStream::new(&b"POST /echo HTTP/1.1\r\nContent-Length: 17\r\n\r\n"[..]);
        HttpServer::handle_connection(&mut stream, echo_router(), &config).await.unwrap();
        assert!(stream.written().starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn test_truncated_body_closes_without_response() {
        let mut stream = MockTcpStream::new(&b"POST /echo HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc"[..]);

        let result = serve_mock(&mut stream).await;

        assert!(matches!(
            result,
            Err(Error::ParseError(ParserError::TruncatedBody { expected: 10, received: 3 }))
        ));
        assert!(stream.write_data.is_empty());
        assert_eq!(stream.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_partial_writes_send_whole_response() {
        let mut stream = MockTcpStream::new(&b"GET /hello HTTP/1.1\r\n\r\n"[..]).with_write_chunk(1);

        serve_mock(&mut stream).await.unwrap();

        assert_eq!(
            stream.written(),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 13\r\n\r\nHello, World!"
        );
    }

    #[tokio::test]
    async fn test_zero_length_write_is_a_failure() {
        let mut stream = MockTcpStream::new(&b"GET /hello HTTP/1.1\r\n\r\n"[..]).with_write_chunk(0);

        let result = serve_mock(&mut stream).await;

        assert!(matches!(result, Err(Error::WriteError(ref e)) if e.kind() == io::ErrorKind::WriteZero));
        assert_eq!(stream.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_empty_connection_is_closed_cleanly() {
        let mut stream = MockTcpStream::new(Vec::new());
        assert_eq!(serve_mock(&mut stream).await.unwrap(), 0);
        assert_eq!(stream.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_bind_failure_is_setup_error() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            addr: occupied.local_addr().unwrap(),
            ..ServerConfig::default()
        };

        let result = HttpServer::new(config).start().await;
        assert!(matches!(result, Err(Error::Setup { .. })));
    }

    /// Read one response off `stream`: the head, then exactly `Content-Length` bytes.
    async fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
        let mut head = Vec::new();
        while !head.ends_with(b"\r\n\r\n") {
            head.push(stream.read_u8().await.unwrap());
        }
        let head = String::from_utf8(head).unwrap();

        let length: usize = head
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        let mut body = vec![0; length];
        stream.read_exact(&mut body).await.unwrap();
        (head, body)
    }

    #[tokio::test]
    async fn test_end_to_end_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut server = HttpServer::new(ServerConfig {
            addr,
            keep_alive_timeout: Duration::from_secs(2),
            ..ServerConfig::default()
        });
        server
            .register_post("/echo", |req, res| res.set_body(req.body.clone()))
            .register_get("/hello", |_req, res| res.append_to_body("hi"));
        let server_task = tokio::spawn(server.serve(listener));

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Split the request so the body arrives in a later segment than the head.
        client.write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhe").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.write_all(b"llo").await.unwrap();

        let (head, body) = read_response(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Length: 5\r\n"));
        assert_eq!(body, b"hello");

        // Same connection, second request.
        client.write_all(b"GET /hello HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, b"hi");

        // The server closes after `Connection: close`.
        let mut rest = Vec::new();
        let n = client.read_to_end(&mut rest).await.unwrap();
        assert_eq!(n, 0);

        // A fresh connection still works.
        let mut second = TcpStream::connect(addr).await.unwrap();
        second.write_all(b"GET /nope HTTP/1.1\r\n\r\n").await.unwrap();
        let (head, _) = read_response(&mut second).await;
        assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));

        server_task.abort();
    }

    #[tokio::test]
    async fn test_single_slot_serves_clients_one_at_a_time() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let idle = Duration::from_millis(300);

        let mut server = HttpServer::new(ServerConfig {
            addr,
            max_connections: 1,
            keep_alive_timeout: idle,
            ..ServerConfig::default()
        });
        server.register_get("/hello", |_req, res| res.append_to_body("hi"));
        let server_task = tokio::spawn(server.serve(listener));

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(b"GET /hello HTTP/1.1\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut first).await;
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, b"hi");
        let first_idle_since = Instant::now();

        // The only slot is held by the idle first connection until its keep-alive
        // period runs out.
        let mut second = TcpStream::connect(addr).await.unwrap();
        second.write_all(b"GET /hello HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
        let (head, body) = read_response(&mut second).await;
        assert!(first_idle_since.elapsed() >= idle - Duration::from_millis(50));
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, b"hi");

        let mut rest = Vec::new();
        assert_eq!(first.read_to_end(&mut rest).await.unwrap(), 0);

        server_task.abort();
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_open_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut server = HttpServer::new(ServerConfig {
            addr,
            keep_alive_timeout: Duration::from_millis(300),
            ..ServerConfig::default()
        });
        server.register_get("/hello", |_req, res| res.append_to_body("hi"));
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server_task = tokio::spawn(server.serve_until(listener, async move {
            let _ = stop_rx.await;
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET /hello HTTP/1.1\r\n\r\n").await.unwrap();
        let (head, _) = read_response(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));

        stop_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!server_task.is_finished(), "server returned while a connection was still open");

        let result = tokio::time::timeout(Duration::from_secs(2), server_task).await.unwrap().unwrap();
        assert!(result.is_ok());

        let mut rest = Vec::new();
        assert_eq!(client.read_to_end(&mut rest).await.unwrap(), 0);
    }
}
