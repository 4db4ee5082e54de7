use crate::{merge_paths, Action};
use corpus_index_core::{resolve_input_path, SourceFormat, SourceRequest};
use dialoguer::Input;
use std::path::Path;
use tracing::debug;

const MERGE_TAGS: [&str; 2] = ["merge_faiss", "merge"];
const DEFAULT_TOP_K: usize = 4;

fn ask(prompt: &str) -> anyhow::Result<String> {
    let answer: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    Ok(answer.trim().to_string())
}

fn is_merge_tag(choice: &str) -> bool {
    let normalized = choice.trim().to_lowercase().replace('-', "_");
    MERGE_TAGS.contains(&normalized.as_str())
}

fn choice_prompt() -> String {
    let tags = SourceFormat::LOADABLE
        .iter()
        .map(|format| format.tag())
        .collect::<Vec<_>>()
        .join(", ");
    format!("What do you want to do? Load documents ({tags}), merge indexes (merge_faiss) or query one (search)")
}

/// Asks which source to load or what to do with existing indexes.
///
/// Returns `None` when the choice matches nothing.
pub fn prompt_action(input_dir: &Path, output_dir: &Path) -> anyhow::Result<Option<Action>> {
    let choice = ask(&choice_prompt())?.to_lowercase();
    debug!(choice = %choice, "interactive choice");

    if is_merge_tag(&choice) {
        let raw = ask("Which indexes should be merged? Give their paths, comma separated")?;
        let name = ask("Name of the merged index")?;
        return Ok(Some(Action::Merge {
            paths: merge_paths(input_dir, &raw),
            name,
        }));
    }

    if choice == "search" {
        let index = ask("Path of the index to query")?;
        let query = ask("Query")?;
        let top_k = ask("How many results? Leave blank for 4")?;
        let top_k = if top_k.is_empty() {
            DEFAULT_TOP_K
        } else {
            top_k.parse()?
        };
        return Ok(Some(Action::Search {
            index: resolve_input_path(output_dir, &index),
            query,
            top_k,
        }));
    }

    let Some(format) = SourceFormat::from_tag(&choice) else {
        return Ok(None);
    };
    let Some(request) = prompt_request(format, input_dir)? else {
        return Ok(None);
    };

    let name = ask("Index name")?;
    Ok(Some(Action::Build { request, name }))
}

fn prompt_request(format: SourceFormat, input_dir: &Path) -> anyhow::Result<Option<SourceRequest>> {
    let input = |raw: &str| resolve_input_path(input_dir, raw);

    let request = match format {
        SourceFormat::Folder => {
            let path = ask("What is the path to the folder holding the documents?")?;
            let glob =
                ask("Which glob pattern selects the documents? Leave blank to feed everything")?;
            SourceRequest::Folder {
                path: input(&path),
                glob,
            }
        }
        SourceFormat::Txt => SourceRequest::Txt {
            path: input(&ask("What is the path to the txt file?")?),
        },
        SourceFormat::Csv => SourceRequest::Csv {
            path: input(&ask("What is the path to the csv file?")?),
        },
        SourceFormat::Pdf => SourceRequest::Pdf {
            path: input(&ask("What is the path to the pdf file?")?),
        },
        SourceFormat::Urls => SourceRequest::Urls {
            urls: ask("Which URLs should be loaded? Separate them with commas")?,
        },
        SourceFormat::UrlsRecursively => SourceRequest::UrlsRecursively {
            url: ask("Which root URL should be crawled?")?,
        },
        SourceFormat::UrlsFromCsv => {
            let path = ask("What is the path to the csv file?")?;
            let column = ask("Which column holds the URLs?")?;
            SourceRequest::UrlsFromCsv {
                path: input(&path),
                column,
            }
        }
        SourceFormat::Html => return Ok(None),
    };

    Ok(Some(request))
}
