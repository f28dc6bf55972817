use super::fragment::Fragment;
use super::library::FragmentLibrary;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown fragment '{0}'")]
pub struct UnknownFragment(pub String);

/// Chooses which library fragments to grow onto the template.
pub trait FragmentSelector {
    fn select<'a>(&self, library: &'a FragmentLibrary) -> Result<Vec<&'a Fragment>, UnknownFragment>;
}

/// Every fragment in the library, in name order.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllFragments;

impl FragmentSelector for AllFragments {
    fn select<'a>(&self, library: &'a FragmentLibrary) -> Result<Vec<&'a Fragment>, UnknownFragment> {
        Ok(library.iter().collect())
    }
}

/// Fragments named explicitly, in the order given. Repeated names are
/// selected once.
#[derive(Debug, Clone, Default)]
pub struct NameSelection {
    names: Vec<String>,
}

impl NameSelection {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl FragmentSelector for NameSelection {
    fn select<'a>(&self, library: &'a FragmentLibrary) -> Result<Vec<&'a Fragment>, UnknownFragment> {
        let mut selected: Vec<&'a Fragment> = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let fragment = library
                .get(name.trim())
                .ok_or_else(|| UnknownFragment(name.clone()))?;
            if !selected.iter().any(|f| f.name() == fragment.name()) {
                selected.push(fragment);
            }
        }
        Ok(selected)
    }
}
