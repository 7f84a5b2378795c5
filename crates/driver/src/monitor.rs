use chordlab_library::message::{self, hex};
use crossbeam_channel::Receiver;

/// One line per frame: the decoded event when there is one, hex otherwise
/// or always when `raw`.
pub(crate) fn format_frame(frame: &[u8], raw: bool) -> String {
    if raw {
        return hex(frame);
    }
    match message::decode(frame, 0) {
        Some(event) => event.to_string(),
        None => hex(frame),
    }
}

/// Prints incoming traffic until the input closes.
pub(crate) fn monitor(frames: Receiver<(u64, Vec<u8>)>, raw: bool) {
    println!("Listening. Press Ctrl+C to stop.");
    for (_, frame) in frames.iter() {
        println!("{}", format_frame(&frame, raw));
    }
}
