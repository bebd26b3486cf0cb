use parking_lot::Mutex;

/// Separator placed between captured lines.
#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

#[derive(Debug, Default)]
struct Buffers {
    output: String,
    error: String,
    merged: String,
}

/// Captured text of one run.
///
/// A single lock covers all three buffers, so each line lands in its own
/// buffer and in the merged buffer as one step. Merged order is the order in
/// which lines arrived from the two pipes, which is not necessarily the order
/// the child wrote them.
#[derive(Debug, Default)]
pub(crate) struct StreamCapture {
    buffers: Mutex<Buffers>,
}

/// Owned snapshot of a [`StreamCapture`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CapturedText {
    pub(crate) output: String,
    pub(crate) error: String,
    pub(crate) merged: String,
}

impl StreamCapture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append_line(&self, stream: StreamKind, line: &str) {
        let mut buffers = self.buffers.lock();
        let Buffers {
            output,
            error,
            merged,
        } = &mut *buffers;
        match stream {
            StreamKind::Stdout => append_line(output, line),
            StreamKind::Stderr => append_line(error, line),
        }
        append_line(merged, line);
    }

    pub(crate) fn snapshot(&self) -> CapturedText {
        let buffers = self.buffers.lock();
        CapturedText {
            output: buffers.output.clone(),
            error: buffers.error.clone(),
            merged: buffers.merged.clone(),
        }
    }

    /// Move the captured text out. Only called once both streams are closed.
    pub(crate) fn take(&self) -> CapturedText {
        let mut buffers = self.buffers.lock();
        let Buffers {
            output,
            error,
            merged,
        } = std::mem::take(&mut *buffers);
        CapturedText {
            output,
            error,
            merged,
        }
    }
}

fn append_line(buffer: &mut String, line: &str) {
    if !buffer.is_empty() {
        buffer.push_str(LINE_SEPARATOR);
    }
    buffer.push_str(line);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn lines_go_to_own_buffer_and_merged() {
        let capture = StreamCapture::new();
        capture.append_line(StreamKind::Stdout, "a");
        capture.append_line(StreamKind::Stderr, "b");
        capture.append_line(StreamKind::Stdout, "c");

        let text = capture.take();
        assert_eq!(text.output, format!("a{LINE_SEPARATOR}c"));
        assert_eq!(text.error, "b");
        assert_eq!(
            text.merged,
            format!("a{LINE_SEPARATOR}b{LINE_SEPARATOR}c")
        );
    }

    #[test]
    fn merged_length_matches_sum_of_streams() {
        let capture = Arc::new(StreamCapture::new());
        let writers: Vec<_> = [StreamKind::Stdout, StreamKind::Stderr]
            .into_iter()
            .map(|stream| {
                let capture = Arc::clone(&capture);
                std::thread::spawn(move || {
                    for index in 0..200 {
                        capture.append_line(stream, &format!("{}-{index}", stream.name()));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().expect("writer thread");
        }

        let text = capture.take();
        let lines = |s: &str| s.split(LINE_SEPARATOR).count();
        assert_eq!(lines(&text.merged), lines(&text.output) + lines(&text.error));
        assert_eq!(
            text.merged.len(),
            text.output.len() + text.error.len() + LINE_SEPARATOR.len()
        );
    }

    #[test]
    fn take_leaves_buffers_empty() {
        let capture = StreamCapture::new();
        capture.append_line(StreamKind::Stdout, "x");
        let _ = capture.take();
        assert_eq!(capture.snapshot(), CapturedText::default());
    }
}
