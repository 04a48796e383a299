/// CSV export helpers
///
/// Exports never load a whole table into memory. Rows are read from a
/// database cursor on a spawned task, grouped into chunks, serialized with
/// the `csv` crate and handed to the HTTP body as a byte stream.
///
/// ```text
/// cursor ──rows──▶ chunker task ──Vec<T>──▶ bounded channel ──Bytes──▶ response body
/// ```
///
/// # Example
///
/// ```
/// use backoffice_shared::export::{csv_chunk, CsvExport};
///
/// struct Row(&'static str);
///
/// impl CsvExport for Row {
///     fn headers() -> &'static [&'static str] {
///         &["Name"]
///     }
///     fn record(&self) -> Vec<String> {
///         vec![self.0.to_string()]
///     }
/// }
///
/// let bytes = csv_chunk(&[Row("a"), Row("b")], true).unwrap();
/// assert_eq!(&bytes[..], b"Name\na\nb\n");
/// ```

use bytes::Bytes;
use chrono::NaiveDate;
use futures::channel::mpsc;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use futures::SinkExt;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

/// Rows per chunk written to the response
pub const EXPORT_CHUNK_SIZE: usize = 500;

/// Chunks buffered between the cursor task and the response body
const CHANNEL_CAPACITY: usize = 2;

/// Error type for export streams
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A record that can be written as one CSV row
pub trait CsvExport {
    /// Header row, in column order
    fn headers() -> &'static [&'static str];

    /// Field values, in the same order as [`CsvExport::headers`]
    fn record(&self) -> Vec<String>;
}

/// Serializes a batch of records, optionally preceded by the header row
pub fn csv_chunk<T: CsvExport>(rows: &[T], include_header: bool) -> Result<Bytes, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::with_capacity(rows.len() * 128));

    if include_header {
        writer.write_record(T::headers())?;
    }

    for row in rows {
        writer.write_record(row.record())?;
    }

    let buffer = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;

    Ok(Bytes::from(buffer))
}

/// Attachment filename, e.g. `guest-inquiries-2026-03-01.csv`
pub fn export_filename(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}.csv", prefix, date.format("%Y-%m-%d"))
}

/// Runs a query on a background task and yields its rows in chunks
///
/// `build` produces the query; it runs on the spawned task so the builder
/// and its bound arguments never have to outlive the caller. The channel is
/// bounded, so a slow client applies backpressure to the cursor. Dropping
/// the receiver stops the task at the next chunk boundary.
pub fn stream_in_chunks<T, F>(
    pool: PgPool,
    chunk_size: usize,
    build: F,
) -> mpsc::Receiver<Result<Vec<T>, sqlx::Error>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static,
    F: FnOnce() -> QueryBuilder<'static, Postgres> + Send + 'static,
{
    let (mut tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let chunk_size = chunk_size.max(1);

    tokio::spawn(async move {
        let mut builder = build();
        let mut rows = builder.build_query_as::<T>().fetch(&pool);
        let mut chunk = Vec::with_capacity(chunk_size);
        let mut sent = 0usize;

        loop {
            match rows.try_next().await {
                Ok(Some(row)) => {
                    chunk.push(row);
                    if chunk.len() == chunk_size {
                        sent += chunk.len();
                        let full = std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size));
                        if tx.send(Ok(full)).await.is_err() {
                            tracing::debug!(rows = sent, "Export receiver dropped");
                            return;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Export query failed");
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }

        sent += chunk.len();
        if !chunk.is_empty() {
            let _ = tx.send(Ok(chunk)).await;
        }
        tracing::debug!(rows = sent, "Export finished");
    });

    rx
}

/// Turns a chunk stream into CSV bytes, header first
///
/// The header is emitted even when there are no rows.
pub fn csv_stream<T, S>(chunks: S) -> impl Stream<Item = Result<Bytes, ExportError>> + Send
where
    T: CsvExport + Send,
    S: Stream<Item = Result<Vec<T>, sqlx::Error>> + Send,
{
    let header = stream::once(async { csv_chunk::<T>(&[], true).map_err(ExportError::from) });

    let body = chunks.map(|chunk| {
        let rows = chunk?;
        csv_chunk(&rows, false).map_err(ExportError::from)
    });

    header.chain(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Line {
        name: String,
        note: String,
    }

    impl CsvExport for Line {
        fn headers() -> &'static [&'static str] {
            &["Name", "Note"]
        }

        fn record(&self) -> Vec<String> {
            vec![self.name.clone(), self.note.clone()]
        }
    }

    fn line(name: &str, note: &str) -> Line {
        Line {
            name: name.to_string(),
            note: note.to_string(),
        }
    }

    #[test]
    fn test_csv_chunk_with_header() {
        let bytes = csv_chunk(&[line("Ada", "first")], true).unwrap();
        assert_eq!(&bytes[..], b"Name,Note\nAda,first\n");
    }

    #[test]
    fn test_csv_chunk_quotes_special_characters() {
        let bytes = csv_chunk(&[line("Doe, Jane", "said \"hi\"\nthen left")], false).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();

        assert_eq!(text, "\"Doe, Jane\",\"said \"\"hi\"\"\nthen left\"\n");
    }

    #[test]
    fn test_csv_chunk_empty_without_header() {
        let bytes = csv_chunk::<Line>(&[], false).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(
            export_filename("guest-inquiries", date),
            "guest-inquiries-2026-03-01.csv"
        );
    }

    #[tokio::test]
    async fn test_csv_stream_emits_header_then_chunks() {
        let chunks = stream::iter(vec![
            Ok(vec![line("a", "1"), line("b", "2")]),
            Ok(vec![line("c", "3")]),
        ]);

        let parts: Vec<Bytes> = csv_stream(chunks).try_collect().await.unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(&parts[0][..], b"Name,Note\n");
        assert_eq!(&parts[1][..], b"a,1\nb,2\n");
        assert_eq!(&parts[2][..], b"c,3\n");
    }

    #[tokio::test]
    async fn test_csv_stream_without_rows_still_has_header() {
        let chunks = stream::iter(Vec::<Result<Vec<Line>, sqlx::Error>>::new());

        let parts: Vec<Bytes> = csv_stream(chunks).try_collect().await.unwrap();

        assert_eq!(parts.len(), 1);
        assert_eq!(&parts[0][..], b"Name,Note\n");
    }

    #[tokio::test]
    async fn test_csv_stream_propagates_database_errors() {
        let chunks = stream::iter(vec![
            Ok(vec![line("a", "1")]),
            Err(sqlx::Error::RowNotFound),
        ]);

        let result: Result<Vec<Bytes>, ExportError> = csv_stream(chunks).try_collect().await;
        assert!(matches!(result, Err(ExportError::Database(_))));
    }
}
