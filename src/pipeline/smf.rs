// Minimal Standard MIDI File writer (format 1), just enough for exported loops.

use super::export::RenderedTrack;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

pub fn encode(tracks: &[RenderedTrack], bpm: u32, ticks_per_beat: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes()); // format 1
    out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&ticks_per_beat.to_be_bytes());

    let tempo = 60_000_000 / bpm.max(1); // microseconds per quarter
    for track in tracks {
        let body = track_chunk(track, tempo);
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
    }
    out
}

fn track_chunk(track: &RenderedTrack, tempo: u32) -> Vec<u8> {
    let mut body = Vec::new();

    write_vlq(&mut body, 0);
    body.extend_from_slice(&[0xFF, 0x03]);
    write_vlq(&mut body, track.name.len() as u32);
    body.extend_from_slice(track.name.as_bytes());

    write_vlq(&mut body, 0);
    body.extend_from_slice(&[0xFF, 0x51, 0x03]);
    body.extend_from_slice(&tempo.to_be_bytes()[1..]);

    let mut now = 0;
    for ev in &track.events {
        write_vlq(&mut body, ev.tick.saturating_sub(now));
        now = now.max(ev.tick);
        let status = if ev.is_onset { NOTE_ON } else { NOTE_OFF };
        body.extend_from_slice(&[status, ev.pitch & 0x7f, ev.velocity & 0x7f]);
    }

    write_vlq(&mut body, 0);
    body.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    body
}

// variable-length quantity: 7 bits per byte, high bit set on all but the last
fn write_vlq(out: &mut Vec<u8>, mut value: u32) {
    let mut buf = [0u8; 5];
    let mut i = buf.len() - 1;
    buf[i] = (value & 0x7f) as u8;
    value >>= 7;
    while value > 0 {
        i -= 1;
        buf[i] = (value & 0x7f) as u8 | 0x80;
        value >>= 7;
    }
    out.extend_from_slice(&buf[i..]);
}
