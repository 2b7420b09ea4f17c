/// Keyboard input headed for the child. Bytes are forwarded untouched.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InputEvent {
    Bytes(Vec<u8>),
}
