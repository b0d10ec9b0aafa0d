use bytes::{Buf, BufMut};

use crate::core::{DataType, DatabaseError, Result, Row, STRING_LEN, Schema, Value};

/// Page size (8 KB, same as `PostgreSQL`)
pub const PAGE_SIZE: usize = 8192;

/// Page ID - uniquely identifies a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: u32,
    pub page_number: u32,
}

impl PageId {
    #[must_use]
    pub const fn new(table_id: u32, page_number: u32) -> Self {
        Self { table_id, page_number }
    }
}

/// Record ID - page plus slot a row lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    #[must_use]
    pub const fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

/// Heap page with fixed-size slots.
///
/// Layout: a header bitmap with one bit per slot (LSB first within each
/// byte), followed by `slot_count` rows of `schema.size()` bytes each. The
/// remainder of the page is zero padding.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Schema,
    header: Vec<u8>,
    slots: Vec<Option<Row>>,
}

impl HeapPage {
    /// Number of rows of `schema` that fit on one page (each row costs its
    /// bytes plus one header bit)
    #[must_use]
    pub fn slots_per_page(schema: &Schema) -> usize {
        (PAGE_SIZE * 8) / (schema.size() * 8 + 1)
    }

    #[must_use]
    pub fn header_size(schema: &Schema) -> usize {
        Self::slots_per_page(schema).div_ceil(8)
    }

    /// Bytes of a page holding no rows
    #[must_use]
    pub fn empty_page_data() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    /// Create a new empty page
    #[must_use]
    pub fn empty(page_id: PageId, schema: &Schema) -> Self {
        let slot_count = Self::slots_per_page(schema);
        Self {
            page_id,
            schema: schema.clone(),
            header: vec![0u8; Self::header_size(schema)],
            slots: vec![None; slot_count],
        }
    }

    /// Decode a page read from disk
    pub fn from_bytes(page_id: PageId, schema: &Schema, data: &[u8]) -> Result<Self> {
        if data.len() != PAGE_SIZE {
            return Err(DatabaseError::StorageIo(format!(
                "page buffer must be {PAGE_SIZE} bytes, got {}",
                data.len()
            )));
        }

        let mut page = Self::empty(page_id, schema);
        let header_size = page.header.len();
        page.header.copy_from_slice(&data[..header_size]);

        let row_size = schema.size();
        for slot in 0..page.slots.len() {
            if !page.is_slot_used(slot) {
                continue;
            }
            let offset = header_size + slot * row_size;
            let mut buf = &data[offset..offset + row_size];
            let row = decode_row(&mut buf, schema)?
                .with_record_id(RecordId::new(page_id, slot as u16));
            page.slots[slot] = Some(row);
        }

        Ok(page)
    }

    /// Serialize page to exactly `PAGE_SIZE` bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let row_size = self.schema.size();
        let mut data = Vec::with_capacity(PAGE_SIZE);
        data.put_slice(&self.header);

        for slot in &self.slots {
            match slot {
                Some(row) => encode_row(&mut data, row)?,
                None => data.put_bytes(0, row_size),
            }
        }

        data.resize(PAGE_SIZE, 0);
        Ok(data)
    }

    #[must_use]
    pub const fn id(&self) -> PageId {
        self.page_id
    }

    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.header
            .get(slot / 8)
            .is_some_and(|byte| byte & (1 << (slot % 8)) != 0)
    }

    fn mark_slot(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }

    #[must_use]
    pub fn num_empty_slots(&self) -> usize {
        (0..self.slots.len()).filter(|&slot| !self.is_slot_used(slot)).count()
    }

    /// Place `row` in the first empty slot and stamp its record id
    pub fn insert_row(&mut self, row: &Row) -> Result<RecordId> {
        row.check_schema(&self.schema)?;
        check_text_lengths(row)?;

        let slot = (0..self.slots.len())
            .find(|&slot| !self.is_slot_used(slot))
            .ok_or_else(|| DatabaseError::StorageIo("page is full".to_string()))?;

        let record_id = RecordId::new(self.page_id, slot as u16);
        self.mark_slot(slot, true);
        self.slots[slot] = Some(row.clone().with_record_id(record_id));
        Ok(record_id)
    }

    /// Remove the row addressed by `row.record_id`
    pub fn delete_row(&mut self, row: &Row) -> Result<()> {
        let record_id = row.record_id.ok_or_else(|| {
            DatabaseError::StorageIo("row has no record id".to_string())
        })?;
        if record_id.page_id != self.page_id {
            return Err(DatabaseError::StorageIo(format!(
                "row belongs to page {:?}, not {:?}",
                record_id.page_id, self.page_id
            )));
        }

        let slot = record_id.slot as usize;
        if !self.is_slot_used(slot) {
            return Err(DatabaseError::StorageIo(format!("slot {slot} is already empty")));
        }

        self.mark_slot(slot, false);
        self.slots[slot] = None;
        Ok(())
    }

    /// Occupied rows in slot order
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.slots.iter().flatten()
    }
}

pub(crate) fn check_text_lengths(row: &Row) -> Result<()> {
    for value in &row.values {
        if let Value::Text(s) = value {
            if s.len() > STRING_LEN {
                return Err(DatabaseError::InvalidArgument(format!(
                    "text value of {} bytes exceeds {STRING_LEN}",
                    s.len()
                )));
            }
        }
    }
    Ok(())
}

fn encode_row(buf: &mut Vec<u8>, row: &Row) -> Result<()> {
    check_text_lengths(row)?;
    for value in &row.values {
        match value {
            Value::Int(i) => buf.put_i32(*i),
            Value::Text(s) => {
                buf.put_u32(s.len() as u32);
                buf.put_slice(s.as_bytes());
                buf.put_bytes(0, STRING_LEN - s.len());
            }
        }
    }
    Ok(())
}

fn decode_row(buf: &mut &[u8], schema: &Schema) -> Result<Row> {
    let mut values = Vec::with_capacity(schema.num_fields());
    for field in schema.fields() {
        let value = match field.data_type {
            DataType::Int => Value::Int(buf.get_i32()),
            DataType::Text => {
                let len = buf.get_u32() as usize;
                if len > STRING_LEN {
                    return Err(DatabaseError::StorageIo(format!(
                        "corrupt text length {len}"
                    )));
                }
                let text = String::from_utf8((*buf)[..len].to_vec())
                    .map_err(|e| DatabaseError::StorageIo(e.to_string()))?;
                buf.advance(STRING_LEN);
                Value::Text(text)
            }
        };
        values.push(value);
    }
    Ok(Row::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::named(&[(DataType::Int, "id"), (DataType::Text, "name")]).unwrap()
    }

    fn int_schema() -> Schema {
        Schema::from_types(&[DataType::Int, DataType::Int, DataType::Int]).unwrap()
    }

    #[test]
    fn test_page_creation() {
        let page_id = PageId::new(1, 0);
        let page = HeapPage::empty(page_id, &schema());

        assert_eq!(page.id(), page_id);
        assert_eq!(page.num_empty_slots(), page.slot_count());
        assert_eq!(page.rows().count(), 0);
    }

    #[test]
    fn test_slot_arithmetic() {
        // 12-byte rows: 8192*8 / (12*8 + 1) = 675 slots, 85 header bytes
        assert_eq!(HeapPage::slots_per_page(&int_schema()), 675);
        assert_eq!(HeapPage::header_size(&int_schema()), 85);
        assert!(HeapPage::header_size(&int_schema()) + 675 * 12 <= PAGE_SIZE);
    }

    #[test]
    fn test_insert_row() {
        let page_id = PageId::new(1, 0);
        let mut page = HeapPage::empty(page_id, &schema());

        let row = Row::new(vec![Value::Int(1), Value::from("Alice")]);
        let rid = page.insert_row(&row).unwrap();

        assert_eq!(rid, RecordId::new(page_id, 0));
        assert!(page.is_slot_used(0));
        assert_eq!(page.num_empty_slots(), page.slot_count() - 1);

        let stored: Vec<&Row> = page.rows().collect();
        assert_eq!(stored[0].values, row.values);
        assert_eq!(stored[0].record_id, Some(rid));
    }

    #[test]
    fn test_insert_wrong_schema() {
        let mut page = HeapPage::empty(PageId::new(1, 0), &schema());
        let row = Row::new(vec![Value::Int(1)]);
        assert!(matches!(page.insert_row(&row), Err(DatabaseError::SchemaMismatch(_))));
    }

    #[test]
    fn test_fill_page() {
        let mut page = HeapPage::empty(PageId::new(1, 0), &int_schema());
        for i in 0..page.slot_count() {
            let i = i as i32;
            page.insert_row(&Row::new(vec![Value::Int(i), Value::Int(i), Value::Int(i)]))
                .unwrap();
        }

        assert_eq!(page.num_empty_slots(), 0);
        let extra = Row::new(vec![Value::Int(0), Value::Int(0), Value::Int(0)]);
        assert!(matches!(page.insert_row(&extra), Err(DatabaseError::StorageIo(_))));
    }

    #[test]
    fn test_delete_row() {
        let page_id = PageId::new(1, 0);
        let mut page = HeapPage::empty(page_id, &schema());

        page.insert_row(&Row::new(vec![Value::Int(1), Value::from("a")])).unwrap();
        page.insert_row(&Row::new(vec![Value::Int(2), Value::from("b")])).unwrap();

        let first = page.rows().next().unwrap().clone();
        page.delete_row(&first).unwrap();

        assert!(!page.is_slot_used(0));
        assert_eq!(page.rows().count(), 1);
        assert!(matches!(page.delete_row(&first), Err(DatabaseError::StorageIo(_))));

        // Freed slot is reused first
        let rid = page.insert_row(&Row::new(vec![Value::Int(3), Value::from("c")])).unwrap();
        assert_eq!(rid.slot, 0);
    }

    #[test]
    fn test_delete_row_from_other_page() {
        let mut page = HeapPage::empty(PageId::new(1, 0), &schema());
        let foreign = Row::new(vec![Value::Int(1), Value::from("x")])
            .with_record_id(RecordId::new(PageId::new(1, 7), 0));
        assert!(page.delete_row(&foreign).is_err());

        let unplaced = Row::new(vec![Value::Int(1), Value::from("x")]);
        assert!(page.delete_row(&unplaced).is_err());
    }

    #[test]
    fn test_serialization() {
        let page_id = PageId::new(1, 3);
        let mut page = HeapPage::empty(page_id, &schema());

        page.insert_row(&Row::new(vec![Value::Int(42), Value::from("forty-two")])).unwrap();
        page.insert_row(&Row::new(vec![Value::Int(-7), Value::from("")])).unwrap();
        let first = page.rows().next().unwrap().clone();
        page.delete_row(&first).unwrap();

        let bytes = page.to_bytes().unwrap();
        assert_eq!(bytes.len(), PAGE_SIZE);

        let decoded = HeapPage::from_bytes(page_id, &schema(), &bytes).unwrap();
        let rows: Vec<&Row> = decoded.rows().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![Value::Int(-7), Value::from("")]);
        assert_eq!(rows[0].record_id, Some(RecordId::new(page_id, 1)));
        assert!(!decoded.is_slot_used(0));
    }

    #[test]
    fn test_empty_template_decodes_empty() {
        let page = HeapPage::from_bytes(PageId::new(1, 0), &schema(), &HeapPage::empty_page_data())
            .unwrap();
        assert_eq!(page.num_empty_slots(), page.slot_count());
    }

    #[test]
    fn test_text_too_long() {
        let mut page = HeapPage::empty(PageId::new(1, 0), &schema());
        let long = "x".repeat(STRING_LEN + 1);
        assert!(matches!(
            page.insert_row(&Row::new(vec![Value::Int(1), Value::Text(long)])),
            Err(DatabaseError::InvalidArgument(_))
        ));
        assert_eq!(page.num_empty_slots(), page.slot_count());
    }
}
