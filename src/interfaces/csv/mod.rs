pub mod deal_writer;
pub mod event_reader;
