use crate::schema::FileTypeSchema;

use super::Catalogue;

pub trait Client {
    type Error;

    /// Loads the sheet for `schema`, `None` when it was never written.
    fn load(
        &self,
        schema: &std::sync::Arc<FileTypeSchema>,
    ) -> impl Future<Output = Result<Option<Catalogue>, Self::Error>>;

    /// Rewrites every given sheet as one unit.
    fn save(&self, catalogues: &[Catalogue]) -> impl Future<Output = Result<(), Self::Error>>;
}
