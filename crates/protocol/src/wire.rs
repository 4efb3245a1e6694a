//! Rahmung des Control-Protokolls auf TCP
//!
//! Jede `ControlMessage` reist als ein Frame: vier Bytes Laenge
//! (u32, big-endian), danach die JSON-kodierte Nachricht.
//!
//! ```text
//! Byte 0..4    Payload-Laenge n (zaehlt die Laengen-Bytes nicht mit)
//! Byte 4..4+n  Payload (JSON)
//! ```
//!
//! Frames oberhalb des Limits werden abgelehnt, bevor Speicher fuer
//! sie reserviert wird.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::control::ControlMessage;

/// Standard-Limit pro Frame (1 MiB)
pub const MAX_FRAME_GROESSE: usize = 1024 * 1024;

/// Breite des Laengenfelds
pub const LAENGENFELD_BYTES: usize = 4;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// `Decoder`/`Encoder` fuer `tokio_util::codec::Framed`
#[derive(Debug, Clone)]
pub struct FrameCodec {
    limit: usize,
}

impl FrameCodec {
    /// Codec mit dem Standard-Limit
    pub fn new() -> Self {
        Self {
            limit: MAX_FRAME_GROESSE,
        }
    }

    /// Codec mit eigenem Frame-Limit
    pub fn mit_limit(limit: usize) -> Self {
        Self { limit }
    }

    /// Aktuelles Frame-Limit in Bytes
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn ungueltig(msg: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg)
}

impl Decoder for FrameCodec {
    type Item = ControlMessage;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LAENGENFELD_BYTES {
            return Ok(None);
        }

        // Laengenfeld nur lesen; konsumiert wird erst beim ganzen Frame
        let laenge = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if laenge > self.limit {
            return Err(ungueltig(format!(
                "Frame zu gross: {laenge} von maximal {} Bytes",
                self.limit
            )));
        }

        if src.len() < LAENGENFELD_BYTES + laenge {
            src.reserve(LAENGENFELD_BYTES + laenge - src.len());
            return Ok(None);
        }

        src.advance(LAENGENFELD_BYTES);
        let payload = src.split_to(laenge);

        let nachricht = serde_json::from_slice(&payload)
            .map_err(|e| ungueltig(format!("Frame ist kein gueltiges JSON: {e}")))?;
        Ok(Some(nachricht))
    }
}

impl Encoder<ControlMessage> for FrameCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: ControlMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)
            .map_err(|e| ungueltig(format!("Nachricht nicht serialisierbar: {e}")))?;

        if payload.len() > self.limit {
            return Err(ungueltig(format!(
                "Nachricht zu gross: {} von maximal {} Bytes",
                payload.len(),
                self.limit
            )));
        }

        dst.reserve(LAENGENFELD_BYTES + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.put_slice(&payload);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlPayload, JoinChatRequest, TypingEvent, TypingRequest};
    use duplex_core::types::{RoomId, UserId};

    fn test_nachricht() -> ControlMessage {
        ControlMessage::ping(1, 99)
    }

    #[test]
    fn kodierter_frame_wird_wieder_dekodiert() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(test_nachricht(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.request_id, 1);
        assert!(matches!(decoded.payload, ControlPayload::Ping(_)));
        assert!(buf.is_empty(), "Buffer muss vollstaendig konsumiert sein");
    }

    #[test]
    fn unvollstaendiger_frame_gibt_none() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(test_nachricht(), &mut buf).unwrap();

        // Nur die Haelfte des Frames anliefern
        let halb = buf.len() / 2;
        let mut teil = BytesMut::from(&buf[..halb]);

        assert!(codec.decode(&mut teil).unwrap().is_none());
    }

    #[test]
    fn zu_wenige_laengen_bytes_geben_none() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0u8, 0u8][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn zu_grosser_frame_wird_abgelehnt() {
        let mut codec = FrameCodec::mit_limit(16);
        let mut buf = BytesMut::new();

        // Laengen-Header behauptet 1000 Bytes
        buf.put_u32(1000);
        buf.put_slice(&[0u8; 8]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn zu_grosse_nachricht_wird_nicht_kodiert() {
        let mut codec = FrameCodec::mit_limit(8);
        let mut buf = BytesMut::new();

        let err = codec.encode(test_nachricht(), &mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        assert!(buf.is_empty());
    }

    #[test]
    fn mehrere_frames_im_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec
            .encode(
                ControlMessage::new(
                    1,
                    ControlPayload::JoinChat(JoinChatRequest {
                        room_id: RoomId::new(),
                    }),
                ),
                &mut buf,
            )
            .unwrap();
        codec
            .encode(
                ControlMessage::new(
                    2,
                    ControlPayload::TypingStart(TypingRequest {
                        room_id: RoomId::new(),
                    }),
                ),
                &mut buf,
            )
            .unwrap();
        codec
            .encode(
                ControlMessage::broadcast(ControlPayload::UserTyping(TypingEvent {
                    room_id: RoomId::new(),
                    user_id: UserId::new(),
                })),
                &mut buf,
            )
            .unwrap();

        let erste = codec.decode(&mut buf).unwrap().unwrap();
        let zweite = codec.decode(&mut buf).unwrap().unwrap();
        let dritte = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(erste.request_id, 1);
        assert_eq!(zweite.request_id, 2);
        assert_eq!(dritte.request_id, 0);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn ungueltiges_json_ist_fehler() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let kaputt = b"{nicht json";
        buf.put_u32(kaputt.len() as u32);
        buf.put_slice(kaputt);

        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn default_limit_ist_ein_mebibyte() {
        let codec = FrameCodec::default();
        assert_eq!(codec.limit(), MAX_FRAME_GROESSE);
    }
}
