use assert_matches::assert_matches;
use lopdf::{Document, Object};
use rstest::rstest;

use crate::jobs::types::JobParameters;
use crate::tests::common::{single_page_pdf, write_tool_input};
use crate::tools::merge::MergeHandler;
use crate::tools::{ToolError, ToolHandler};

/// Width of the MediaBox of page number `page` in the document.
fn page_width(document: &Document, page: u32) -> i64 {
    let page_id = *document.get_pages().get(&page).expect("page missing");
    let page_dict = document.get_object(page_id).unwrap().as_dict().unwrap();
    let media_box = page_dict.get(b"MediaBox").unwrap().as_array().unwrap();
    match media_box[2] {
        Object::Integer(width) => width,
        Object::Real(width) => width as i64,
        _ => panic!("unexpected MediaBox entry"),
    }
}

#[rstest]
fn merge_of_three_documents_keeps_pages_in_input_order() {
    let scratch = tempfile::tempdir().unwrap();
    let inputs = vec![
        write_tool_input(scratch.path(), 0, "first.pdf", &single_page_pdf(100)),
        write_tool_input(scratch.path(), 1, "second.pdf", &single_page_pdf(200)),
        write_tool_input(scratch.path(), 2, "third.pdf", &single_page_pdf(300)),
    ];

    let results = MergeHandler.execute(&inputs, &JobParameters::Merge).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "merged.pdf");
    assert_eq!(results[0].content_type, "application/pdf");

    let merged = Document::load_mem(&results[0].data).expect("merged output must parse");
    assert_eq!(merged.get_pages().len(), 3);
    assert_eq!(page_width(&merged, 1), 100);
    assert_eq!(page_width(&merged, 2), 200);
    assert_eq!(page_width(&merged, 3), 300);
}

#[rstest]
fn merge_of_single_document_round_trips() {
    let scratch = tempfile::tempdir().unwrap();
    let inputs = vec![write_tool_input(scratch.path(), 0, "only.pdf", &single_page_pdf(150))];

    let results = MergeHandler.execute(&inputs, &JobParameters::Merge).unwrap();
    let merged = Document::load_mem(&results[0].data).unwrap();
    assert_eq!(merged.get_pages().len(), 1);
}

#[rstest]
fn merge_rejects_garbage_input() {
    let scratch = tempfile::tempdir().unwrap();
    let inputs = vec![write_tool_input(scratch.path(), 0, "broken.pdf", b"definitely not a pdf")];

    let result = MergeHandler.execute(&inputs, &JobParameters::Merge);
    assert_matches!(result, Err(ToolError::MalformedInput { name, .. }) if name == "broken.pdf");
}

#[rstest]
fn merge_validation_rejects_foreign_parameters() {
    use crate::jobs::types::{CompressionLevel, ToolType};
    use crate::jobs::ValidationError;

    let result = MergeHandler.validate_submission(
        &["tmp/a/one.pdf".to_string()],
        &JobParameters::Reduce { level: CompressionLevel::Low },
    );
    assert_matches!(result, Err(ValidationError::ParameterMismatch { tool_type: ToolType::Merge }));
}
