//! Capture fixtures written on the fly: frame builders, legacy pcap and
//! pcapng writers, and a tiny HTTP server for fetcher tests.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use etherparse::PacketBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const LINKTYPE_ETHERNET: u32 = 1;
const SNAPLEN: u32 = 65_535;
const ETHERTYPE_ARP: u16 = 0x0806;

const PCAPNG_SECTION_HEADER: u32 = 0x0A0D_0D0A;
const PCAPNG_INTERFACE_DESCRIPTION: u32 = 1;
const PCAPNG_ENHANCED_PACKET: u32 = 6;
const PCAPNG_BYTE_ORDER_MAGIC: u32 = 0x1A2B_3C4D;

/// One record: timestamp in microseconds plus the captured bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub ts_us: u64,
    pub data: Vec<u8>,
    /// Original length when it differs from the captured length.
    pub origlen: Option<u32>,
}

impl Frame {
    pub fn new(ts_us: u64, data: Vec<u8>) -> Self {
        Self {
            ts_us,
            data,
            origlen: None,
        }
    }

    pub fn with_origlen(mut self, origlen: u32) -> Self {
        self.origlen = Some(origlen);
        self
    }
}

pub fn tcp_frame(src_port: u16, dst_port: u16, payload_len: usize) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([0x02, 0, 0, 0, 0, 1], [0x02, 0, 0, 0, 0, 2])
        .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
        .tcp(src_port, dst_port, 1, 8192);
    let payload = vec![0xab; payload_len];
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder
        .write(&mut frame, &payload)
        .expect("tcp frame builds");
    frame
}

pub fn udp_frame(src_port: u16, dst_port: u16, payload_len: usize) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([0x02, 0, 0, 0, 0, 3], [0x02, 0, 0, 0, 0, 4])
        .ipv4([192, 168, 1, 10], [192, 168, 1, 20], 64)
        .udp(src_port, dst_port);
    let payload = vec![0xcd; payload_len];
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder
        .write(&mut frame, &payload)
        .expect("udp frame builds");
    frame
}

/// UDP frame cut a few bytes into the UDP header.
pub fn truncated_udp_frame() -> Vec<u8> {
    let mut frame = udp_frame(4000, 53, 32);
    frame.truncate(14 + 20 + 4);
    frame
}

pub fn arp_frame() -> Vec<u8> {
    let mut frame = Vec::with_capacity(14 + 28);
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 5]);
    frame.extend_from_slice(&ETHERTYPE_ARP.to_be_bytes());
    frame.extend_from_slice(&[0u8; 28]);
    frame
}

/// Byte order and timestamp resolution of a legacy pcap fixture.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyFormat {
    pub big_endian: bool,
    pub nanosecond: bool,
}

/// Little-endian, microsecond legacy pcap.
pub fn pcap_bytes(frames: &[Frame]) -> Vec<u8> {
    legacy_pcap_bytes(frames, LegacyFormat::default())
}

pub fn legacy_pcap_bytes(frames: &[Frame], format: LegacyFormat) -> Vec<u8> {
    let u32_bytes = |value: u32| {
        if format.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    };
    let u16_bytes = |value: u16| {
        if format.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    };
    let magic = if format.nanosecond {
        0xa1b2_3c4d
    } else {
        0xa1b2_c3d4
    };

    let mut out = Vec::new();
    out.extend_from_slice(&u32_bytes(magic));
    out.extend_from_slice(&u16_bytes(2));
    out.extend_from_slice(&u16_bytes(4));
    out.extend_from_slice(&u32_bytes(0));
    out.extend_from_slice(&u32_bytes(0));
    out.extend_from_slice(&u32_bytes(SNAPLEN));
    out.extend_from_slice(&u32_bytes(LINKTYPE_ETHERNET));

    for frame in frames {
        let caplen = frame.data.len() as u32;
        let frac = (frame.ts_us % 1_000_000) as u32;
        let frac = if format.nanosecond { frac * 1_000 } else { frac };
        out.extend_from_slice(&u32_bytes((frame.ts_us / 1_000_000) as u32));
        out.extend_from_slice(&u32_bytes(frac));
        out.extend_from_slice(&u32_bytes(caplen));
        out.extend_from_slice(&u32_bytes(frame.origlen.unwrap_or(caplen)));
        out.extend_from_slice(&frame.data);
    }
    out
}

pub fn write_pcap(path: &Path, frames: &[Frame]) {
    fs::write(path, pcap_bytes(frames)).expect("write pcap fixture");
}

/// Big-endian pcapng with one Ethernet interface at microsecond resolution.
pub fn pcapng_bytes(frames: &[Frame]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&pcapng_block(PCAPNG_SECTION_HEADER, &section_header_body()));
    out.extend_from_slice(&pcapng_block(
        PCAPNG_INTERFACE_DESCRIPTION,
        &interface_description_body(),
    ));
    for frame in frames {
        out.extend_from_slice(&pcapng_block(
            PCAPNG_ENHANCED_PACKET,
            &enhanced_packet_body(frame),
        ));
    }
    out
}

pub fn write_pcapng(path: &Path, frames: &[Frame]) {
    fs::write(path, pcapng_bytes(frames)).expect("write pcapng fixture");
}

fn pcapng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (8 + body.len() + 4) as u32;
    let mut block = Vec::with_capacity(total_len as usize);
    block.extend_from_slice(&block_type.to_be_bytes());
    block.extend_from_slice(&total_len.to_be_bytes());
    block.extend_from_slice(body);
    block.extend_from_slice(&total_len.to_be_bytes());
    block
}

fn section_header_body() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&PCAPNG_BYTE_ORDER_MAGIC.to_be_bytes());
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&(-1i64).to_be_bytes());
    body
}

fn interface_description_body() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(LINKTYPE_ETHERNET as u16).to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&SNAPLEN.to_be_bytes());
    body
}

fn enhanced_packet_body(frame: &Frame) -> Vec<u8> {
    let caplen = frame.data.len() as u32;
    let mut body = Vec::new();
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(&((frame.ts_us >> 32) as u32).to_be_bytes());
    body.extend_from_slice(&(frame.ts_us as u32).to_be_bytes());
    body.extend_from_slice(&caplen.to_be_bytes());
    body.extend_from_slice(&frame.origlen.unwrap_or(caplen).to_be_bytes());
    body.extend_from_slice(&frame.data);
    let pad_len = (4 - (frame.data.len() % 4)) % 4;
    body.extend(std::iter::repeat_n(0u8, pad_len));
    body
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("gzip fixture");
    encoder.finish().expect("gzip fixture")
}

/// Serve `routes` (path, body) over HTTP/1.1 on a loopback port; any other
/// path gets a 404. Returns the base URL, e.g. `http://127.0.0.1:41234`.
pub async fn serve_http(routes: Vec<(&'static str, Vec<u8>)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let routes = Arc::new(routes);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = match routes.iter().find(|(route, _)| *route == path) {
                    Some((_, body)) => ("200 OK", body.as_slice()),
                    None => ("404 Not Found", &[][..]),
                };
                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(body).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}
