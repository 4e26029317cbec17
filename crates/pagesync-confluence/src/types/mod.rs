//! Confluence API types.

mod attachment;
mod page;

pub use attachment::{Attachment, AttachmentFile};
pub use page::{CreatePage, Page, PageRef, UpdatePage};

pub(crate) use attachment::AttachmentsResponse;
pub(crate) use page::{ChildrenResponse, ContentResponse};
