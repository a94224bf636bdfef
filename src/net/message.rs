//! Pipeline events produced by the HTTP codec.
//!
//! A message is a head (`Request` / `Response`), zero or more `Content`
//! chunks, and a `LastContent` end-of-message marker. `Full*` variants carry
//! a whole message in one event and count as both head and marker.

use bytes::Bytes;
use http::{request, response, Request, Response, StatusCode};

/// One framed HTTP event travelling through a pipeline.
#[derive(Debug, Clone)]
pub enum HttpObject {
    Request(request::Parts),
    Response(response::Parts),
    Content(Bytes),
    LastContent(Bytes),
    FullRequest(request::Parts, Bytes),
    FullResponse(response::Parts, Bytes),
}

impl HttpObject {
    /// Head-only request event.
    pub fn request(req: Request<()>) -> Self {
        HttpObject::Request(req.into_parts().0)
    }

    /// Head-only response event.
    pub fn response(res: Response<()>) -> Self {
        HttpObject::Response(res.into_parts().0)
    }

    pub fn content(chunk: impl Into<Bytes>) -> Self {
        HttpObject::Content(chunk.into())
    }

    pub fn last_content(chunk: impl Into<Bytes>) -> Self {
        HttpObject::LastContent(chunk.into())
    }

    pub fn request_head(&self) -> Option<&request::Parts> {
        match self {
            HttpObject::Request(parts) | HttpObject::FullRequest(parts, _) => Some(parts),
            _ => None,
        }
    }

    pub fn request_head_mut(&mut self) -> Option<&mut request::Parts> {
        match self {
            HttpObject::Request(parts) | HttpObject::FullRequest(parts, _) => Some(parts),
            _ => None,
        }
    }

    pub fn response_head(&self) -> Option<&response::Parts> {
        match self {
            HttpObject::Response(parts) | HttpObject::FullResponse(parts, _) => Some(parts),
            _ => None,
        }
    }

    /// True for events that end a message.
    pub fn is_last(&self) -> bool {
        matches!(
            self,
            HttpObject::LastContent(_) | HttpObject::FullRequest(..) | HttpObject::FullResponse(..)
        )
    }

    /// True for a `100 Continue` interim response head.
    pub fn is_continue(&self) -> bool {
        self.response_head()
            .is_some_and(|parts| parts.status == StatusCode::CONTINUE)
    }

    /// Number of payload bytes carried by this event.
    pub fn payload_len(&self) -> usize {
        match self {
            HttpObject::Content(b)
            | HttpObject::LastContent(b)
            | HttpObject::FullRequest(_, b)
            | HttpObject::FullResponse(_, b) => b.len(),
            HttpObject::Request(_) | HttpObject::Response(_) => 0,
        }
    }
}

impl From<Request<Bytes>> for HttpObject {
    fn from(req: Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        HttpObject::FullRequest(parts, body)
    }
}

impl From<Response<Bytes>> for HttpObject {
    fn from(res: Response<Bytes>) -> Self {
        let (parts, body) = res.into_parts();
        HttpObject::FullResponse(parts, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_messages_are_heads_and_markers() {
        let req: HttpObject = Request::get("/ping").body(Bytes::from_static(b"hi")).unwrap().into();
        assert!(req.request_head().is_some());
        assert!(req.is_last());
        assert_eq!(req.payload_len(), 2);

        let head = HttpObject::request(Request::get("/ping").body(()).unwrap());
        assert!(!head.is_last());
        assert_eq!(head.payload_len(), 0);
    }

    #[test]
    fn continue_is_detected_on_heads_only() {
        let interim = HttpObject::response(
            Response::builder()
                .status(StatusCode::CONTINUE)
                .body(())
                .unwrap(),
        );
        assert!(interim.is_continue());
        assert!(!HttpObject::last_content("").is_continue());
        assert!(!HttpObject::response(Response::new(())).is_continue());
    }
}
