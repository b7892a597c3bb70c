//! Reference user/company mapper.
//!
//! Cleans user records (dedup by `id`, email and username validation), adds
//! derived columns and produces a second dataset counting users per company.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Int64Array, StringArray};
use arrow::compute::{cast, filter_record_batch};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::app::ports::{NamedDataset, RecordMapper};
use crate::error::MapperError;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").expect("email pattern compiles")
});

const ID: &str = "id";
const EMAIL: &str = "email";
const USERNAME: &str = "username";
const DOMAIN: &str = "domain";
const FULL_ADDRESS: &str = "full_address";
const COMPANY_NAME: &str = "company.name";
const USER_COUNT: &str = "user_count";
const ADDRESS_PARTS: [&str; 4] = ["address.street", "address.suite", "address.city", "address.zipcode"];
const MIN_USERNAME_CHARS: usize = 5;

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

pub struct BusinessMapper {
    user_dataset: String,
    company_dataset: String,
}

impl BusinessMapper {
    pub fn new(user_dataset: impl Into<String>, company_dataset: impl Into<String>) -> Self {
        Self {
            user_dataset: user_dataset.into(),
            company_dataset: company_dataset.into(),
        }
    }

    /// Rows to keep: first occurrence of each id, valid email, long enough username.
    /// Duplicates are resolved before validation, so an invalid first occurrence
    /// still hides later rows with the same id.
    fn keep_mask(batch: &RecordBatch) -> Result<BooleanArray, MapperError> {
        let ids = string_column(batch, ID)?;
        let emails = string_column(batch, EMAIL)?;
        let usernames = string_column(batch, USERNAME)?;

        let mut seen: HashSet<Option<&str>> = HashSet::new();
        let keep: Vec<bool> = (0..batch.num_rows())
            .map(|i| {
                let first = seen.insert(ids.is_valid(i).then(|| ids.value(i)));
                let email_ok = emails.is_valid(i) && is_valid_email(emails.value(i));
                let username_ok =
                    usernames.is_valid(i) && usernames.value(i).chars().count() >= MIN_USERNAME_CHARS;
                first && email_ok && username_ok
            })
            .collect();
        Ok(BooleanArray::from(keep))
    }

    fn users(&self, filtered: &RecordBatch) -> Result<RecordBatch, MapperError> {
        let emails = string_column(filtered, EMAIL)?;
        let domains: StringArray = emails
            .iter()
            .map(|e| e.and_then(|e| e.split_once('@')).map(|(_, d)| d.to_string()))
            .collect();

        let parts = ADDRESS_PARTS
            .iter()
            .map(|name| string_column(filtered, name))
            .collect::<Result<Vec<_>, _>>()?;
        let full_address: StringArray = (0..filtered.num_rows())
            .map(|i| {
                let rendered: Vec<&str> = parts
                    .iter()
                    .map(|col| if col.is_valid(i) { col.value(i) } else { "" })
                    .collect();
                Some(rendered.join(", "))
            })
            .collect();

        let schema = filtered.schema();
        let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len() + 2);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() + 2);
        for (field, column) in schema.fields().iter().zip(filtered.columns()) {
            match field.name().as_str() {
                DOMAIN | FULL_ADDRESS => continue,
                ID => {
                    fields.push(Field::new(ID, DataType::Utf8, field.is_nullable()));
                    columns.push(cast(column, &DataType::Utf8)?);
                }
                _ => {
                    fields.push(field.as_ref().clone());
                    columns.push(column.clone());
                }
            }
        }
        fields.push(Field::new(DOMAIN, DataType::Utf8, true));
        columns.push(Arc::new(domains));
        fields.push(Field::new(FULL_ADDRESS, DataType::Utf8, false));
        columns.push(Arc::new(full_address));

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }

    fn companies(users: &RecordBatch) -> Result<RecordBatch, MapperError> {
        let names = string_column(users, COMPANY_NAME)?;
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for name in names.iter().flatten() {
            *counts.entry(name).or_default() += 1;
        }

        let schema = Schema::new(vec![
            Field::new(COMPANY_NAME, DataType::Utf8, false),
            Field::new(USER_COUNT, DataType::Int64, false),
        ]);
        let company_col: StringArray = counts.keys().map(|k| Some(*k)).collect();
        let count_col = Int64Array::from(counts.values().copied().collect::<Vec<_>>());
        Ok(RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(company_col), Arc::new(count_col)],
        )?)
    }
}

impl RecordMapper for BusinessMapper {
    fn transform(&self, batch: &RecordBatch) -> Result<Vec<NamedDataset>, MapperError> {
        if batch.num_rows() == 0 {
            debug!("Empty batch, no datasets produced");
            return Ok(Vec::new());
        }

        let keep = Self::keep_mask(batch)?;
        let filtered = filter_record_batch(batch, &keep)?;
        debug!(
            "Kept {} of {} user records after dedup and validation",
            filtered.num_rows(),
            batch.num_rows()
        );

        let users = self.users(&filtered)?;
        let companies = Self::companies(&users)?;

        Ok(vec![
            NamedDataset::new(self.user_dataset.clone(), users),
            NamedDataset::new(self.company_dataset.clone(), companies),
        ])
    }

    fn mapper_name(&self) -> &'static str {
        "business"
    }
}

/// Column `name` as text, whatever its inferred type
fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray, MapperError> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| MapperError::MissingColumn(name.to_string()))?;
    let text = cast(column, &DataType::Utf8)?;
    Ok(text.as_string::<i32>().clone())
}
