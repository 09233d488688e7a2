//! Catch-all DNS responder. Every `A` question is answered with the
//! device's own address so that clients open the portal for any name.

use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

const HEADER_LEN: usize = 12;
const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;
const ANSWER_TTL_SECS: u32 = 60;
/// Compression pointer to the first question name, right after the header.
const NAME_POINTER: [u8; 2] = [0xC0, 0x0C];
const MAX_PACKET: usize = 512;

/// Builds the reply to one query packet, or `None` when the packet is a
/// response, uses another opcode, or cannot be parsed.
pub fn build_reply(query: &[u8], ip: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() < HEADER_LEN {
        return None;
    }
    let flags = query[2];
    let is_response = flags & 0x80 != 0;
    let opcode = (flags >> 3) & 0x0F;
    let question_count = u16::from_be_bytes([query[4], query[5]]);
    if is_response || opcode != 0 || question_count == 0 {
        return None;
    }

    let mut offset = HEADER_LEN;
    loop {
        let len = *query.get(offset)? as usize;
        if len == 0 {
            offset += 1;
            break;
        }
        // Queries never use compression; labels are at most 63 bytes.
        if len > 63 {
            return None;
        }
        offset += 1 + len;
    }
    let fixed = query.get(offset..offset + 4)?;
    let qtype = u16::from_be_bytes([fixed[0], fixed[1]]);
    let qclass = u16::from_be_bytes([fixed[2], fixed[3]]);
    let question = &query[HEADER_LEN..offset + 4];
    let answer = qtype == TYPE_A && qclass == CLASS_IN;

    let mut reply = Vec::with_capacity(HEADER_LEN + question.len() + 16);
    reply.extend_from_slice(&query[0..2]);
    // QR + AA, echo RD; RA, NOERROR.
    reply.push(0x84 | (flags & 0x01));
    reply.push(0x80);
    reply.extend_from_slice(&1u16.to_be_bytes());
    reply.extend_from_slice(&u16::from(answer).to_be_bytes());
    reply.extend_from_slice(&[0, 0, 0, 0]);
    reply.extend_from_slice(question);

    if answer {
        reply.extend_from_slice(&NAME_POINTER);
        reply.extend_from_slice(&TYPE_A.to_be_bytes());
        reply.extend_from_slice(&CLASS_IN.to_be_bytes());
        reply.extend_from_slice(&ANSWER_TTL_SECS.to_be_bytes());
        reply.extend_from_slice(&4u16.to_be_bytes());
        reply.extend_from_slice(&ip.octets());
    }
    Some(reply)
}

/// Serves queries until the socket fails to bind. Per-packet errors are
/// logged and skipped.
pub async fn serve(bind_addr: SocketAddr, ip: Ipv4Addr) -> std::io::Result<()> {
    let socket = UdpSocket::bind(bind_addr).await?;
    tracing::info!(%bind_addr, %ip, "dns responder listening");

    let mut buf = [0u8; MAX_PACKET];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                tracing::warn!(error = %e, "dns receive failed");
                continue;
            }
        };
        let Some(reply) = build_reply(&buf[..len], ip) else {
            tracing::trace!(%peer, len, "ignoring dns packet");
            continue;
        };
        if let Err(e) = socket.send_to(&reply, peer).await {
            tracing::warn!(%peer, error = %e, "dns send failed");
        }
    }
}
