use crate::buffer::StreamBuffer;
use std::task::Waker;

pub(crate) struct ReaderState {
    pub(crate) buffer: StreamBuffer,
    pub(crate) boundary: String,
    pub(crate) stage: StreamingStage,
    pub(crate) is_prev_section_consumed: bool,
    pub(crate) next_section_waker: Option<Waker>,
    pub(crate) next_section_idx: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamingStage {
    ReadingBoundary,
    ReadingSectionHeaders,
    ReadingSectionData,
    DrainingPrevSectionData,
    Eof,
}
