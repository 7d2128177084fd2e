// tests/ingest_pipeline.rs
use async_trait::async_trait;
use bakery_reviews::ingest::types::{CellValue, IngestError, RawTable, Review, TableSource};
use bakery_reviews::ingest::{fetch_reviews, MAX_REVIEWS};

struct MockProvider {
    table: RawTable,
}

#[async_trait]
impl TableSource for MockProvider {
    async fn fetch_table(&self) -> Result<RawTable, IngestError> {
        Ok(self.table.clone())
    }
    fn name(&self) -> &'static str {
        "MockProvider"
    }
}

fn row(cells: &[&str]) -> Vec<CellValue> {
    cells.iter().map(|c| CellValue::from(*c)).collect()
}

#[tokio::test]
async fn messy_sheet_is_cleaned_filtered_and_capped() {
    let mut rows = vec![
        row(&["", "<i>Anna</i>", "Best&nbsp;cake   ever /* pasted */", "7.8"]),
        row(&["", "Eve", "<script>var x = document.cookie;</script>", "5"]),
        row(&["", "Sam", "Lovely!", "abc"]),
        row(&["", "Dan", "Fine", "-3"]),
        row(&["", "", "No name given", "5"]),
        row(&["", "Zed"]),
    ];
    for i in 0..30 {
        let name = format!("Guest {i}");
        rows.push(row(&["", name.as_str(), "Delicious", "4"]));
    }

    let provider = MockProvider {
        table: RawTable {
            columns: vec![
                "Submitted".into(),
                "Customer".into(),
                "Testimonial".into(),
                "Score".into(),
            ],
            rows,
        },
    };
    let out = fetch_reviews(&provider).await.unwrap();

    assert_eq!(out.len(), MAX_REVIEWS);
    assert_eq!(
        out[0],
        Review {
            name: "Anna".into(),
            review_text: "Best cake ever".into(),
            rating: Some(5),
        }
    );
    assert_eq!(out[1].name, "Sam");
    assert_eq!(out[1].rating, None);
    assert_eq!(out[2].rating, Some(0));
    assert_eq!(out[3].name, "Guest 0");
    assert_eq!(out.last().unwrap().name, "Guest 20");
}
