//! Include fragment loading.

use std::path::Path;

use tracing::debug;

use super::document::{IncludeFragment, MergeDocument};
use super::layout::{list_fragments, SUB_INCLUDE_DIRS};
use super::parse_info::{ParseInfo, ParseInfoEntry};
use crate::error::ModelResult;
use crate::format::read_fragment;

/// Merges every `<dir>/*.<fmt>` under the key named by its file stem.
///
/// `trace_prefix` labels the fragments in the parse trace; bundled fragments
/// pass `None` and are not traced.
pub async fn merge_includes(
    doc: &mut MergeDocument,
    dir: &Path,
    trace_prefix: Option<&str>,
    info: &mut ParseInfo,
) -> ModelResult<()> {
    for path in list_fragments(dir)? {
        let value = read_fragment(&path).await?;
        let Some(include) = IncludeFragment::new(&path, value) else {
            continue;
        };

        debug!(key = %include.key, path = %path.display(), "Merging include");
        if let Some(prefix) = trace_prefix {
            info.push(ParseInfoEntry::new(
                format!("{}:{}", prefix, include.key),
                &path,
            ));
        }
        doc.merge_include(include);
    }
    Ok(())
}

/// Appends `<includes>/{singles,collections,menus}/*.<fmt>` to their sections.
pub async fn append_sub_includes(
    doc: &mut MergeDocument,
    includes_dir: &Path,
    info: &mut ParseInfo,
) -> ModelResult<()> {
    for (sub_dir, section) in SUB_INCLUDE_DIRS {
        for path in list_fragments(&includes_dir.join(sub_dir))? {
            let value = read_fragment(&path).await?;
            debug!(section, path = %path.display(), "Appending include");
            info.push(ParseInfoEntry::new(format!("include.{}", section), &path));
            doc.append_to_section(section, value);
        }
    }
    Ok(())
}
