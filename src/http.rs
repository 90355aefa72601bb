use crate::error::{ServerError, ServerResult};
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Write;
use std::str::{self, FromStr};

/// HTTP Status Codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 200,
    NotModified = 304,

    BadRequest = 400,
    NotFound = 404,
    PayloadTooLarge = 413,

    InternalServerError = 500,
}

impl Status {
    /// Get the text description for this status code
    pub fn as_str(&self) -> &'static str {
        match *self {
            Status::Ok => "OK",
            Status::NotModified => "Not Modified",

            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::PayloadTooLarge => "Payload Too Large",

            Status::InternalServerError => "Internal Server Error",
        }
    }

    /// Numeric status code
    pub fn code(&self) -> u16 {
        *self as u16
    }
}

/// HTTP Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Trace,
    Connect,
    Patch,
}

impl Method {
    /// Convert the method to a string
    pub fn as_str(&self) -> &'static str {
        match *self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Patch => "PATCH",
        }
    }

    /// Whether the method only reads the resource
    pub fn is_read_only(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl FromStr for Method {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "CONNECT" => Ok(Method::Connect),
            "PATCH" => Ok(Method::Patch),
            _ => Err(ServerError::HttpParse(format!("Invalid method: {}", s))),
        }
    }
}

/// HTTP Parser State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpParserState {
    RequestLine,
    Body,
    Complete,
}

/// Incremental HTTP/1.1 request parser.
///
/// Bytes are buffered until the header block is complete, then the body is
/// collected up to `Content-Length`.
pub struct HttpParser {
    pub state: HttpParserState,
    pub method: Option<Method>,
    pub uri: Option<String>,
    pub version: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub content_length: usize,
    pending: Vec<u8>,
}

impl HttpParser {
    /// Create a new HTTP parser
    pub fn new() -> Self {
        Self {
            state: HttpParserState::RequestLine,
            method: None,
            uri: None,
            version: None,
            headers: HashMap::new(),
            body: Vec::new(),
            content_length: 0,
            pending: Vec::new(),
        }
    }

    /// Feed a chunk of data
    pub fn parse(&mut self, data: &[u8]) -> ServerResult<()> {
        if self.state == HttpParserState::Complete {
            self.reset();
        }

        match self.state {
            HttpParserState::RequestLine => {
                self.pending.extend_from_slice(data);
                let Some(headers_end) = find_subsequence(&self.pending, b"\r\n\r\n") else {
                    return Ok(());
                };

                let head = self.pending[..headers_end].to_vec();
                let rest = self.pending[headers_end + 4..].to_vec();
                self.pending.clear();
                self.parse_head(&head)?;

                self.state = HttpParserState::Body;
                self.push_body(&rest);
            }
            HttpParserState::Body => self.push_body(data),
            HttpParserState::Complete => {}
        }

        Ok(())
    }

    fn parse_head(&mut self, head: &[u8]) -> ServerResult<()> {
        let head = str::from_utf8(head)
            .map_err(|_| ServerError::HttpParse("Invalid UTF-8".to_string()))?;

        let mut lines = head.split("\r\n");
        let request_line = lines
            .next()
            .ok_or_else(|| ServerError::HttpParse("Missing request line".to_string()))?;
        self.parse_request_line(request_line)?;

        for line in lines.filter(|line| !line.is_empty()) {
            self.parse_header(line)?;
        }

        if let Some(content_length) = self.headers.get("content-length") {
            self.content_length = content_length
                .parse()
                .map_err(|_| ServerError::HttpParse(format!("Invalid Content-Length: {}", content_length)))?;
        }
        Ok(())
    }

    fn push_body(&mut self, data: &[u8]) {
        let missing = self.content_length.saturating_sub(self.body.len());
        self.body.extend_from_slice(&data[..data.len().min(missing)]);
        if self.body.len() >= self.content_length {
            self.state = HttpParserState::Complete;
        }
    }

    /// Parse a request line
    fn parse_request_line(&mut self, line: &str) -> ServerResult<()> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ServerError::HttpParse("Invalid request line".to_string()));
        }

        self.method = Some(parts[0].parse()?);
        self.uri = Some(parts[1].to_string());
        self.version = Some(parts[2].to_string());

        Ok(())
    }

    /// Parse a header line. Repeated fields are joined with ", ".
    fn parse_header(&mut self, line: &str) -> ServerResult<()> {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| ServerError::HttpParse("Invalid header".to_string()))?;

        let key = key.trim().to_lowercase();
        let value = value.trim();
        self.headers
            .entry(key)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
        Ok(())
    }

    /// Check if the parser has completed parsing a request
    pub fn is_complete(&self) -> bool {
        self.state == HttpParserState::Complete
    }

    /// Number of bytes buffered while waiting for the end of the header block
    pub fn buffered_len(&self) -> usize {
        self.pending.len()
    }

    /// Reset the parser for a new request
    pub fn reset(&mut self) {
        self.state = HttpParserState::RequestLine;
        self.method = None;
        self.uri = None;
        self.version = None;
        self.headers.clear();
        self.body.clear();
        self.content_length = 0;
        self.pending.clear();
    }

    /// Get the parsed request
    pub fn get_request(&self) -> ServerResult<Request> {
        if !self.is_complete() {
            return Err(ServerError::HttpParse("Request not complete".to_string()));
        }

        let method = self
            .method
            .ok_or_else(|| ServerError::HttpParse("Method not set".to_string()))?;

        let uri = self
            .uri
            .as_ref()
            .ok_or_else(|| ServerError::HttpParse("URI not set".to_string()))?;

        let mut request = Request::new(method, uri);
        request.headers = self.headers.clone();
        request.body = self.body.clone();
        Ok(request)
    }
}

impl Default for HttpParser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// HTTP Request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: String,
    /// Header names are stored lowercased
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Builder-style header setter
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_lowercase(), value.to_string());
    }

    /// Get a header
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// The request path, without query string or fragment.
    ///
    /// Absolute-form targets (`http://host/path`) are reduced to their path.
    pub fn path(&self) -> &str {
        let mut target = self.uri.as_str();
        if let Some(scheme_end) = target.find("://") {
            let after = &target[scheme_end + 3..];
            target = after.find('/').map_or("/", |slash| &after[slash..]);
        }
        let end = target.find(['?', '#']).unwrap_or(target.len());
        &target[..end]
    }
}

/// HTTP Response
#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Response {
    /// Create a new response
    pub fn new(status: Status) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Create a response with the given headers and no body
    pub fn with_headers(status: Status, headers: HashMap<String, String>) -> Self {
        Self {
            status,
            headers,
            body: Bytes::new(),
        }
    }

    /// Set a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    /// Get a header, ignoring case
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a plain-text body and update content-length
    pub fn set_text_body(&mut self, body: &str) {
        self.body = Bytes::copy_from_slice(body.as_bytes());
        self.set_header("Content-Length", &self.body.len().to_string());
        self.set_header("Content-Type", "text/plain");
    }

    /// Serialize the response to a byte vector
    pub fn serialize(&self, writer: &mut Vec<u8>) -> ServerResult<()> {
        write!(writer, "HTTP/1.1 {} {}\r\n", self.status.code(), self.status.as_str())?;

        let mut names: Vec<&String> = self.headers.keys().collect();
        names.sort();
        for name in names {
            write!(writer, "{}: {}\r\n", name, self.headers[name])?;
        }
        if !self.headers.keys().any(|name| name.eq_ignore_ascii_case("connection")) {
            write!(writer, "Connection: close\r\n")?;
        }

        write!(writer, "\r\n")?;
        writer.extend_from_slice(&self.body);

        Ok(())
    }
}
