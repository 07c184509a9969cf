use crate::domain::deal::{Deal, DealId, DealStatus};
use crate::domain::user::UserId;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One line of the final deal table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealRow {
    pub deal_id: DealId,
    pub creator_id: UserId,
    pub amount: Decimal,
    pub status: DealStatus,
    /// Number of payment claims recorded against the deal.
    pub payments: usize,
}

impl DealRow {
    pub fn new(deal: &Deal, payments: usize) -> Self {
        Self {
            deal_id: deal.deal_id.clone(),
            creator_id: deal.creator_id,
            amount: deal.amount.value(),
            status: deal.status,
            payments,
        }
    }
}

/// Writes the deal table as CSV with a header row.
pub struct DealWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> DealWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_rows(&mut self, rows: impl IntoIterator<Item = DealRow>) -> Result<()> {
        let mut wrote_any = false;
        for row in rows {
            self.writer.serialize(row)?;
            wrote_any = true;
        }
        // serialize() emits the header with the first row only.
        if !wrote_any {
            self.writer
                .write_record(["deal_id", "creator_id", "amount", "status", "payments"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
