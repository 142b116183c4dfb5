//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one static body, one request per connection. Honors HEAD and
//! `Range: bytes=a-b` by default; each behavior can be switched off to mimic
//! less capable servers. Every request is recorded for assertions.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405.
    pub head_allowed: bool,
    /// If false, GET ignores Range and returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, `Accept-Ranges: bytes` is never sent.
    pub advertise_ranges: bool,
    /// If false, no Content-Length header is sent on HEAD or GET.
    pub send_length: bool,
    /// Close the connection after this many body bytes of any GET.
    pub truncate_after: Option<usize>,
    /// The first this-many GETs answer `503 Service Unavailable` with a
    /// short text body instead of the file.
    pub busy_gets: usize,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
            send_length: true,
            truncate_after: None,
            busy_gets: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Inclusive range from the Range header; open ends are `u64::MAX`.
    pub range: Option<(u64, u64)>,
}

pub struct RangeServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl RangeServer {
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Ranges of every GET that carried a Range header, in arrival order.
    pub fn get_ranges(&self) -> Vec<(u64, u64)> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "GET")
            .filter_map(|r| r.range)
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }
}

pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

/// Serve `body` from a background thread until the process exits.
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    let gets = Arc::new(AtomicUsize::new(0));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let log = Arc::clone(&log);
            let gets = Arc::clone(&gets);
            thread::spawn(move || handle(stream, &body, opts, &log, &gets));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/file.bin", port),
        requests,
    }
}

fn handle(
    mut stream: TcpStream,
    body: &[u8],
    opts: RangeServerOptions,
    log: &Mutex<Vec<Request>>,
    gets: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    log.lock().unwrap().push(request.clone());

    let total = body.len() as u64;
    let length_header = |n: usize| {
        if opts.send_length {
            format!("Content-Length: {}\r\n", n)
        } else {
            String::new()
        }
    };
    let accept_ranges = if opts.advertise_ranges && opts.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    match request.method.as_str() {
        "HEAD" if opts.head_allowed => {
            let head = format!(
                "HTTP/1.1 200 OK\r\n{}{}Connection: close\r\n\r\n",
                length_header(body.len()),
                accept_ranges
            );
            let _ = stream.write_all(head.as_bytes());
        }
        "GET" if gets.fetch_add(1, Ordering::SeqCst) < opts.busy_gets => {
            let _ = stream.write_all(
                b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy",
            );
        }
        "GET" => {
            let (status, content_range, slice) = match request.range.filter(|_| opts.support_ranges) {
                Some((start, end)) => {
                    let end = end.min(total.saturating_sub(1));
                    if start > end || start >= total {
                        let head = format!(
                            "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                            total
                        );
                        let _ = stream.write_all(head.as_bytes());
                        return;
                    }
                    (
                        "206 Partial Content",
                        format!("Content-Range: bytes {}-{}/{}\r\n", start, end, total),
                        &body[start as usize..=end as usize],
                    )
                }
                None => ("200 OK", String::new(), body),
            };
            let head = format!(
                "HTTP/1.1 {}\r\n{}{}{}Connection: close\r\n\r\n",
                status,
                length_header(slice.len()),
                content_range,
                accept_ranges
            );
            let sent = opts.truncate_after.map_or(slice.len(), |n| n.min(slice.len()));
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&slice[..sent]);
            let _ = stream.flush();
        }
        _ => {
            let _ = stream.write_all(
                b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    }
}

/// Read up to the end of the request head and parse method and Range.
fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let text = String::from_utf8_lossy(&buf);
    let mut lines = text.lines();
    let method = lines.next()?.split_whitespace().next()?.to_string();
    let range = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .and_then(|(_, value)| parse_range(value.trim()));
    Some(Request { method, range })
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let bytes = value.strip_prefix("bytes=")?;
    let (start, end) = bytes.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => u64::MAX,
        e => e.parse().ok()?,
    };
    Some((start, end))
}
