//! Static descriptions of RPC services and their methods.

use serde::Serialize;
use streamgate_core::OperationDefinition;

/// One method of a service, with the operation it is authorized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub operation: OperationDefinition,
}

impl MethodDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, operation: OperationDefinition) -> Self {
        Self { name, operation }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    pub methods: Vec<MethodDescriptor>,
    /// Largest request body the transport accepts for this service.
    pub max_receive_message_size: usize,
}

impl ServiceDescriptor {
    #[must_use]
    pub fn new(name: &'static str, max_receive_message_size: usize) -> Self {
        Self {
            name,
            methods: Vec::new(),
            max_receive_message_size,
        }
    }

    #[must_use]
    pub fn method(mut self, name: &'static str, operation: OperationDefinition) -> Self {
        self.methods.push(MethodDescriptor::new(name, operation));
        self
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub(crate) fn summary(&self) -> SupportedService {
        SupportedService {
            service: self.name,
            methods: self.methods.iter().map(|m| m.name).collect(),
        }
    }
}

/// Wire form of one service in `server-features/GetSupportedMethods`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportedService {
    pub service: &'static str,
    pub methods: Vec<&'static str>,
}

#[cfg(test)]
mod tests {
    use streamgate_core::operations;

    use super::*;

    #[test]
    fn finds_methods_by_exact_name() {
        let descriptor = ServiceDescriptor::new("gossip", 1024)
            .method("Update", operations::node::GOSSIP_UPDATE)
            .method("Read", operations::node::GOSSIP_READ);

        assert_eq!(
            descriptor.find("Read").map(|m| m.operation),
            Some(operations::node::GOSSIP_READ)
        );
        assert!(descriptor.find("read").is_none());
        assert_eq!(descriptor.summary().methods, vec!["Update", "Read"]);
    }
}
