use std::collections::BTreeMap;

use lopdf::{Document, Object, ObjectId};

use crate::jobs::constants::MERGE_RESULT_FILE_NAME;
use crate::jobs::error::ValidationError;
use crate::jobs::types::{JobParameters, ToolType};
use crate::tools::{ResultFile, ToolError, ToolHandler, ToolInput};

pub struct MergeHandler;

impl ToolHandler for MergeHandler {
    fn tool_type(&self) -> ToolType {
        ToolType::Merge
    }

    fn validate_submission(&self, _input_refs: &[String], parameters: &JobParameters) -> Result<(), ValidationError> {
        parameters.ensure_matches_tool(&ToolType::Merge)
    }

    fn execute(&self, inputs: &[ToolInput], _parameters: &JobParameters) -> Result<Vec<ResultFile>, ToolError> {
        let mut documents = Vec::with_capacity(inputs.len());
        for input in inputs {
            let document = Document::load(&input.path).map_err(|e| ToolError::MalformedInput {
                name: input.label().to_string(),
                reason: e.to_string(),
            })?;
            if document.get_pages().is_empty() {
                return Err(ToolError::MalformedInput {
                    name: input.label().to_string(),
                    reason: "document has no pages".to_string(),
                });
            }
            documents.push(document);
        }

        let data = merge_documents(documents)?;
        Ok(vec![ResultFile {
            name: MERGE_RESULT_FILE_NAME.to_string(),
            data,
            content_type: "application/pdf",
        }])
    }
}

/// Combines the documents into one, pages in input order. Objects of all
/// inputs are renumbered into one id space, then a fresh page tree and
/// catalog are built on top.
fn merge_documents(documents: Vec<Document>) -> Result<Vec<u8>, ToolError> {
    let mut max_id = 1;
    let mut documents_pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut documents_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut document = Document::with_version("1.5");

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        documents_pages.extend(
            doc.get_pages()
                .into_values()
                .filter_map(|object_id| doc.get_object(object_id).ok().map(|object| (object_id, object.to_owned()))),
        );
        documents_objects.extend(doc.objects);
    }

    let mut catalog_object: Option<(ObjectId, Object)> = None;
    let mut pages_object: Option<(ObjectId, Object)> = None;

    // Pages are processed later; outlines are dropped entirely.
    for (object_id, object) in documents_objects.iter() {
        let type_name = object.as_dict().ok().and_then(|dict| dict.get(b"Type").ok());
        match type_name {
            Some(Object::Name(name)) if name == b"Catalog" => {
                catalog_object = Some((
                    if let Some((id, _)) = catalog_object { id } else { *object_id },
                    object.clone(),
                ));
            }
            Some(Object::Name(name)) if name == b"Pages" => {
                if let Ok(dictionary) = object.as_dict() {
                    let mut dictionary = dictionary.clone();
                    if let Some((_, ref object)) = pages_object {
                        if let Ok(old_dictionary) = object.as_dict() {
                            dictionary.extend(old_dictionary);
                        }
                    }
                    pages_object = Some((
                        if let Some((id, _)) = pages_object { id } else { *object_id },
                        Object::Dictionary(dictionary),
                    ));
                }
            }
            Some(Object::Name(name)) if name == b"Page" => {}
            Some(Object::Name(name)) if name == b"Outlines" || name == b"Outline" => {}
            _ => {
                document.objects.insert(*object_id, object.clone());
            }
        }
    }

    let pages_object =
        pages_object.ok_or_else(|| ToolError::Internal("no page tree found in any input".to_string()))?;
    let catalog_object =
        catalog_object.ok_or_else(|| ToolError::Internal("no catalog found in any input".to_string()))?;

    for (object_id, object) in documents_pages.iter() {
        if let Ok(dictionary) = object.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Parent", pages_object.0);
            document.objects.insert(*object_id, Object::Dictionary(dictionary));
        }
    }

    if let Ok(dictionary) = pages_object.1.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Count", documents_pages.len() as u32);
        dictionary.set(
            "Kids",
            documents_pages.keys().map(|object_id| Object::Reference(*object_id)).collect::<Vec<_>>(),
        );
        document.objects.insert(pages_object.0, Object::Dictionary(dictionary));
    }

    if let Ok(dictionary) = catalog_object.1.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Pages", pages_object.0);
        dictionary.remove(b"Outlines");
        document.objects.insert(catalog_object.0, Object::Dictionary(dictionary));
    }

    document.trailer.set("Root", catalog_object.0);
    document.max_id = document.objects.len() as u32;
    document.renumber_objects();
    document.compress();

    let mut buffer = Vec::new();
    document.save_to(&mut buffer).map_err(|e| ToolError::EncodeFailure(e.to_string()))?;
    Ok(buffer)
}
