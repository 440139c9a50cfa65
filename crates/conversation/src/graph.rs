//! Graph topology as a pure state machine
//!
//! Four node kinds with a fixed topology; the router is the only node with
//! conditional branching. Transitions are computed by a pure function so the
//! topology is testable without any I/O or persistence.

/// The nodes of the conversation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Router,
    DocumentProcessor,
    ResponseGenerator,
    CitationProcessor,
    End,
}

impl NodeKind {
    /// The node a turn starts at.
    pub fn start() -> Self {
        NodeKind::Router
    }

    /// Fixed successor for every node except the router, which branches on
    /// its route decision.
    pub fn successor(&self, route: RouteDecision) -> NodeKind {
        match self {
            NodeKind::Router => match route {
                RouteDecision::ProcessDocuments => NodeKind::DocumentProcessor,
                RouteDecision::GenerateResponse => NodeKind::ResponseGenerator,
                RouteDecision::ProcessCitations => NodeKind::CitationProcessor,
                RouteDecision::End => NodeKind::End,
            },
            NodeKind::DocumentProcessor => NodeKind::ResponseGenerator,
            NodeKind::ResponseGenerator => NodeKind::CitationProcessor,
            NodeKind::CitationProcessor => NodeKind::End,
            NodeKind::End => NodeKind::End,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Router => "router",
            NodeKind::DocumentProcessor => "document_processor",
            NodeKind::ResponseGenerator => "response_generator",
            NodeKind::CitationProcessor => "citation_processor",
            NodeKind::End => "end",
        }
    }
}

/// The router's classification of a user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteDecision {
    /// More document context is needed before answering.
    ProcessDocuments,
    /// Ready to answer directly.
    #[default]
    GenerateResponse,
    /// Only citation cleanup is required.
    ProcessCitations,
    /// The conversation should terminate.
    End,
}

impl RouteDecision {
    /// Parse the label the routing call returned. Unrecognized labels default
    /// to `GenerateResponse`; routing must never fail a turn.
    pub fn parse(label: &str) -> Self {
        let lowered = label.to_ascii_lowercase();
        if lowered.contains("document_processor") || lowered.contains("process_documents") {
            RouteDecision::ProcessDocuments
        } else if lowered.contains("citation_processor") || lowered.contains("process_citations") {
            RouteDecision::ProcessCitations
        } else if lowered.contains("response_generator") || lowered.contains("generate_response") {
            RouteDecision::GenerateResponse
        } else if lowered
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .any(|token| token == "end")
        {
            RouteDecision::End
        } else {
            RouteDecision::default()
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteDecision::ProcessDocuments => "document_processor",
            RouteDecision::GenerateResponse => "response_generator",
            RouteDecision::ProcessCitations => "citation_processor",
            RouteDecision::End => "end",
        }
    }
}
