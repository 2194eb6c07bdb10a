#![allow(dead_code)]

use spdymux::proto::spdy::frame::{Frame, Kind};
use spdymux::proto::spdy::Session;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A session that keeps every frame it is asked to write.
#[derive(Default)]
pub struct Recorder {
    frames: Mutex<Vec<Frame>>,
    fail: AtomicBool,
}

impl Recorder {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn kinds(&self) -> Vec<(Kind, bool)> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|frame| (frame.kind(), frame.is_fin()))
            .collect()
    }

    pub fn take(&self) -> Vec<Frame> {
        std::mem::replace(&mut *self.frames.lock().unwrap(), Vec::new())
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter_map(|frame| match frame {
                Frame::Data(data) => Some(data.payload().to_vec()),
                _ => None,
            })
            .collect()
    }
}

impl Session for Recorder {
    fn write_frame(&self, frame: Frame) -> io::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "session gone"));
        }

        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}
