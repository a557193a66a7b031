use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    Error, ErrorContext, ErrorDetail, feature,
    grouping::{group_attribute, split_key},
};

use super::{Member, Renderer, TabCache, TabContext, TabSource};

/// Open tabs, per file type, in opening order.
pub struct OpenTabsCache<R: Renderer> {
    context: Arc<TabContext<R>>,
    tabs: IndexMap<String, IndexMap<String, TabCache<R>>>,
}

impl<R: Renderer> OpenTabsCache<R> {
    pub fn new(context: TabContext<R>) -> Self {
        Self {
            context: Arc::new(context),
            tabs: IndexMap::new(),
        }
    }

    pub fn context(&self) -> &TabContext<R> {
        &self.context
    }

    /// Resolves a file path or a `#`-joined group key into a tab source.
    fn open(&self, key: &str) -> Result<TabCache<R>, Error> {
        let ctx = ErrorContext::new(key);
        let not_a_candidate = || ctx.error(ErrorDetail::NotATabCandidate(key.to_owned()));
        let records = split_key(key)
            .iter()
            .map(|path| feature::extract(&self.context.schemas, path))
            .collect::<Result<Vec<_>, _>>()?;
        let attribute = match records.len() {
            0 => return Err(not_a_candidate()),
            1 => None,
            _ => Some(group_attribute(&records).ok_or_else(not_a_candidate)?),
        };
        let file_type = records[0].file_type.clone();
        let schema = self
            .context
            .schemas
            .get(&file_type)
            .map_err(|detail| ctx.with_file_type(&file_type).error(detail))?
            .clone();
        let mut members = records
            .into_iter()
            .map(|record| Member::import(record, &schema))
            .collect::<Result<Vec<_>, _>>()?;
        if members.iter().all(|member| member.curves.is_empty()) {
            return Err(not_a_candidate());
        }
        let source = match attribute {
            Some(attribute) => TabSource::Group { attribute, members },
            None => TabSource::File(members.pop().ok_or_else(not_a_candidate)?),
        };
        TabCache::new(key, schema, source, self.context.clone())
    }

    /// The tab for `key`, opening it on first use.
    pub fn tab(&mut self, key: &str) -> Result<&mut TabCache<R>, Error> {
        let ctx = ErrorContext::new(key);
        let first = split_key(key)
            .into_iter()
            .next()
            .ok_or_else(|| ctx.error(ErrorDetail::NotATabCandidate(key.to_owned())))?;
        let file_type = feature::extract_type_only(&self.context.schemas, &first)?;
        let is_open = self
            .tabs
            .get(&file_type)
            .is_some_and(|tabs| tabs.contains_key(key));
        if !is_open {
            let tab = self.open(key)?;
            debug!(key, file_type = %file_type, "tab opened");
            self.tabs
                .entry(file_type.clone())
                .or_default()
                .insert(key.to_owned(), tab);
        }
        self.tabs
            .get_mut(&file_type)
            .and_then(|tabs| tabs.get_mut(key))
            .ok_or_else(|| ctx.error(ErrorDetail::TabNotOpen))
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.tabs.values().any(|tabs| tabs.contains_key(key))
    }

    pub fn del_tab(&mut self, key: &str) -> Result<(), Error> {
        let closed = self
            .tabs
            .values_mut()
            .any(|tabs| tabs.shift_remove(key).is_some());
        if !closed {
            return Err(ErrorContext::new(key).error(ErrorDetail::TabNotOpen));
        }
        debug!(key, "tab closed");
        Ok(())
    }

    pub fn close_all_tabs(&mut self) {
        let count = self.tabs.values().map(|tabs| tabs.len()).sum::<usize>();
        self.tabs.clear();
        debug!(count, "all tabs closed");
    }

    pub fn keys<'a>(&'a self, file_type: &str) -> impl Iterator<Item = &'a str> + use<'a, R> {
        self.tabs
            .get(file_type)
            .into_iter()
            .flat_map(|tabs| tabs.keys().map(String::as_str))
    }
}
