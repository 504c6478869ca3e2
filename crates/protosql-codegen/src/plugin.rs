//! protoc plugin protocol: `CodeGeneratorRequest` in, `CodeGeneratorResponse`
//! out. Failures travel in the response's `error` field; the process itself
//! only fails when the request cannot be decoded.

use prost::Message;
use prost_types::compiler::code_generator_response::{Feature, File};
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use protosql_descriptor::DescriptorIndex;
use tracing::{debug, warn};

use crate::config::GenerateConfig;
use crate::error::Result;
use crate::sql::{self, GeneratedFile};
use crate::surface::Surface;

/// Handles one decoded request.
pub fn respond(request: &CodeGeneratorRequest) -> CodeGeneratorResponse {
    let mut response = CodeGeneratorResponse {
        supported_features: Some(Feature::Proto3Optional as u64),
        ..Default::default()
    };
    match generate(request) {
        Ok(files) => {
            response.file = files
                .into_iter()
                .map(|f| File {
                    name: Some(f.name),
                    content: Some(f.content),
                    ..Default::default()
                })
                .collect();
        }
        Err(e) => {
            warn!(error = %e, "generation failed");
            response.error = Some(e.to_string());
        }
    }
    response
}

fn generate(request: &CodeGeneratorRequest) -> Result<Vec<GeneratedFile>> {
    let config = GenerateConfig::from_parameter(request.parameter())?;
    debug!(
        files = request.file_to_generate.len(),
        proto_files = request.proto_file.len(),
        ?config,
        "plugin request"
    );
    let index = DescriptorIndex::from_files(&request.proto_file)?;
    let surface = Surface::build(&index, &request.file_to_generate, &config)?;
    sql::render(&index, &surface)
}

/// Bytes-level driver: decodes a serialized request and returns the
/// serialized response.
pub fn process(request: &[u8]) -> std::result::Result<Vec<u8>, prost::DecodeError> {
    let request = CodeGeneratorRequest::decode(request)?;
    Ok(respond(&request).encode_to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::field_descriptor_proto::Type;
    use protosql_descriptor::builder::{FileBuilder, MessageBuilder};

    fn request(parameter: &str) -> CodeGeneratorRequest {
        let file = FileBuilder::new("acme/order.proto", "acme")
            .message(MessageBuilder::new("Order").field("id", 1, Type::Int64))
            .build();
        CodeGeneratorRequest {
            file_to_generate: vec!["acme/order.proto".into()],
            parameter: Some(parameter.to_string()),
            proto_file: vec![file],
            ..Default::default()
        }
    }

    #[test]
    fn emits_one_file_per_source() {
        let response = respond(&request("descriptor_set_name=acme"));
        assert_eq!(response.error, None);
        assert_eq!(response.supported_features, Some(Feature::Proto3Optional as u64));
        assert_eq!(response.file.len(), 1);
        assert_eq!(response.file[0].name(), "acme/order.sql");
        assert!(response.file[0].content().contains("`order_get_id`"));
    }

    #[test]
    fn bad_parameters_fail_through_the_response() {
        let response = respond(&request("bogus=1"));
        assert!(response.file.is_empty());
        assert!(response.error().contains("bogus"));
    }

    #[test]
    fn bytes_round_trip() {
        let bytes = process(&request("").encode_to_vec()).unwrap();
        let response = CodeGeneratorResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(response.file.len(), 1);
        assert!(process(&[0xff]).is_err());
    }
}
