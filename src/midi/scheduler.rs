use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use super::{MidiError, NoteSink};

const MIN_NOTE_LENGTH: Duration = Duration::from_millis(10); // zero-length notes get dropped by some synths

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct PendingRelease {
    deadline: Instant,
    seq: u64, // keeps equal deadlines in the order they were scheduled
    pitch: u8,
}

/// Sends the note-on straight away and owes the endpoint a note-off later.
/// Nothing in here blocks; releases go out whenever the loop calls `flush_due`.
pub struct NoteScheduler<S: NoteSink> {
    sink: S,
    pending: BinaryHeap<Reverse<PendingRelease>>,
    next_seq: u64,
}

impl<S: NoteSink> NoteScheduler<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pending: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn schedule(&mut self, pitch: i32, velocity: u8, length: Duration) -> Result<bool, MidiError> {
        self.schedule_at(Instant::now(), pitch, velocity, length)
    }

    /// Returns whether a note actually went out: pitches outside 0..=127 are
    /// skipped with `Ok(false)`. If the note-on fails, no release is owed, so
    /// nothing is queued.
    pub fn schedule_at(
        &mut self,
        now: Instant,
        pitch: i32,
        velocity: u8,
        length: Duration,
    ) -> Result<bool, MidiError> {
        let Ok(pitch) = u8::try_from(pitch) else {
            return Ok(false);
        };
        if pitch > 127 {
            return Ok(false);
        }
        self.sink.note_on(pitch, velocity.min(127))?;
        let deadline = now + length.max(MIN_NOTE_LENGTH);
        self.pending.push(Reverse(PendingRelease {
            deadline,
            seq: self.next_seq,
            pitch,
        }));
        self.next_seq += 1;
        Ok(true)
    }

    #[cfg(test)]
    pub fn flush_due(&mut self) -> Result<usize, MidiError> {
        self.flush_due_at(Instant::now())
    }

    /// Releases everything whose deadline has passed, earliest first. An entry
    /// is popped before it's sent, so a failed send is never retried into a
    /// double note-off.
    pub fn flush_due_at(&mut self, now: Instant) -> Result<usize, MidiError> {
        let mut sent = 0;
        let mut first_err = None;
        while let Some(Reverse(next)) = self.pending.peek() {
            if next.deadline > now {
                break;
            }
            let pitch = next.pitch;
            self.pending.pop();
            match self.sink.note_off(pitch) {
                Ok(()) => sent += 1,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }

    /// Shutdown path: every owed release goes out now, due or not.
    pub fn release_all(&mut self) -> Result<usize, MidiError> {
        let mut sent = 0;
        let mut first_err = None;
        while let Some(Reverse(next)) = self.pending.pop() {
            match self.sink.note_off(next.pitch) {
                Ok(()) => sent += 1,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::testing::{RecordingSink, Sent};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn onset_goes_out_immediately() {
        let mut sched = NoteScheduler::new(RecordingSink::default());
        let t0 = Instant::now();
        assert!(sched.schedule_at(t0, 60, 100, ms(50)).unwrap());
        assert_eq!(sched.sink().sent, vec![Sent::On(60, 100)]);
        assert_eq!(sched.pending_len(), 1);
    }

    #[test]
    fn out_of_range_pitches_are_ignored() {
        let mut sched = NoteScheduler::new(RecordingSink::default());
        let t0 = Instant::now();
        assert!(!sched.schedule_at(t0, -1, 100, ms(50)).unwrap());
        assert!(!sched.schedule_at(t0, 128, 100, ms(50)).unwrap());
        assert!(!sched.schedule_at(t0, 134, 100, ms(50)).unwrap());
        assert!(!sched.schedule_at(t0, 300, 100, ms(50)).unwrap());
        assert!(sched.sink().sent.is_empty());
        assert_eq!(sched.pending_len(), 0);
    }

    #[test]
    fn release_waits_for_its_deadline() {
        let mut sched = NoteScheduler::new(RecordingSink::default());
        let t0 = Instant::now();
        sched.schedule_at(t0, 40, 90, ms(90)).unwrap();
        assert_eq!(sched.flush_due_at(t0 + ms(89)).unwrap(), 0);
        assert_eq!(sched.flush_due_at(t0 + ms(90)).unwrap(), 1);
        assert_eq!(sched.sink().releases(), 1);
        // nothing left to release twice
        assert_eq!(sched.flush_due_at(t0 + ms(500)).unwrap(), 0);
        assert_eq!(sched.sink().releases(), 1);
    }

    #[test]
    fn tiny_lengths_get_the_floor() {
        let mut sched = NoteScheduler::new(RecordingSink::default());
        let t0 = Instant::now();
        sched.schedule_at(t0, 40, 90, Duration::ZERO).unwrap();
        assert_eq!(sched.flush_due_at(t0 + ms(9)).unwrap(), 0);
        assert_eq!(sched.flush_due_at(t0 + ms(10)).unwrap(), 1);
    }

    #[test]
    fn releases_come_out_in_deadline_order() {
        let mut sched = NoteScheduler::new(RecordingSink::default());
        let t0 = Instant::now();
        sched.schedule_at(t0, 48, 80, ms(250)).unwrap();
        sched.schedule_at(t0, 36, 120, ms(40)).unwrap();
        sched.schedule_at(t0 + ms(5), 70, 70, ms(20)).unwrap();
        assert_eq!(sched.flush_due_at(t0 + ms(100)).unwrap(), 2);
        assert_eq!(sched.flush_due_at(t0 + ms(300)).unwrap(), 1);
        let offs: Vec<Sent> = sched
            .sink()
            .sent
            .iter()
            .copied()
            .filter(|s| matches!(s, Sent::Off(_)))
            .collect();
        assert_eq!(offs, vec![Sent::Off(70), Sent::Off(36), Sent::Off(48)]);
    }

    #[test]
    fn release_all_drains_everything() {
        let mut sched = NoteScheduler::new(RecordingSink::default());
        let t0 = Instant::now();
        for pitch in [36, 42, 70] {
            sched.schedule_at(t0, pitch, 100, ms(1000)).unwrap();
        }
        assert_eq!(sched.release_all().unwrap(), 3);
        assert_eq!(sched.pending_len(), 0);
    }

    #[test]
    fn wall_clock_release_after_sleeping() {
        let mut sched = NoteScheduler::new(RecordingSink::default());
        assert!(sched.schedule(50, 100, ms(200)).unwrap());
        assert_eq!(sched.flush_due().unwrap(), 0);
        std::thread::sleep(ms(250));
        assert_eq!(sched.flush_due().unwrap(), 1);
        assert_eq!(sched.sink().sent, vec![Sent::On(50, 100), Sent::Off(50)]);
    }

    #[test]
    fn failed_onset_owes_no_release() {
        let mut sched = NoteScheduler::new(RecordingSink { fail: true, ..Default::default() });
        assert!(sched.schedule_at(Instant::now(), 60, 100, ms(50)).is_err());
        assert_eq!(sched.pending_len(), 0);
    }
}
