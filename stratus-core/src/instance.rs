//! Instance type and machine image resolution for the EC2 launch mode.

use crate::clients::ImageCatalog;
use crate::error::{Result, StratusError};
use crate::params::{keys, Lookup, StackParams};
use tracing::info;

/// Instance type used when the caller does not pick one.
pub const DEFAULT_INSTANCE_TYPE: &str = "t2.micro";

/// Instance type from `params`, injecting [`DEFAULT_INSTANCE_TYPE`] when absent.
pub fn resolve_instance_type(params: &mut StackParams) -> String {
    match params.lookup(keys::INSTANCE_TYPE) {
        Lookup::Present(instance_type) => instance_type.to_string(),
        Lookup::Absent => {
            info!("Defaulting instance type to {}", DEFAULT_INSTANCE_TYPE);
            params.add(keys::INSTANCE_TYPE, DEFAULT_INSTANCE_TYPE);
            DEFAULT_INSTANCE_TYPE.to_string()
        }
    }
}

/// Fail unless `instance_type` is exactly one of `supported`.
pub fn validate_instance_type(instance_type: &str, supported: &[String], region: &str) -> Result<()> {
    if supported.iter().any(|t| t == instance_type) {
        return Ok(());
    }
    Err(StratusError::UnsupportedInstanceType {
        instance_type: instance_type.to_string(),
        region: region.to_string(),
        supported: supported.to_vec(),
    })
}

/// Inject the recommended image id unless the caller supplied one.
///
/// Lookup failures are returned unchanged.
pub async fn resolve_image(params: &mut StackParams, catalog: &dyn ImageCatalog) -> Result<()> {
    if params.lookup(keys::AMI_ID).is_present() {
        return Ok(());
    }

    let instance_type = resolve_instance_type(params);
    let image = catalog.recommended_image(&instance_type).await?;
    info!(
        "Using recommended {} AMI with ECS Agent {} and {}",
        image.os_name, image.agent_version, image.runtime_version
    );
    params.add(keys::AMI_ID, image.image_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ImageMetadata;
    use crate::params::REQUIRED_PARAMETERS;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedCatalog {
        requested: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FixedCatalog {
        fn new(fail: bool) -> Self {
            Self { requested: Mutex::new(Vec::new()), fail }
        }
    }

    #[async_trait]
    impl ImageCatalog for FixedCatalog {
        async fn supported_instance_types(&self, _region: &str) -> Result<Vec<String>> {
            Ok(vec![DEFAULT_INSTANCE_TYPE.to_string()])
        }

        async fn recommended_image(&self, instance_type: &str) -> Result<ImageMetadata> {
            self.requested.lock().unwrap().push(instance_type.to_string());
            if self.fail {
                return Err(StratusError::remote("ssm", "ParameterNotFound: no image"));
            }
            Ok(ImageMetadata {
                image_id: "ami-deadb33f".into(),
                os_name: "Amazon Linux 2".into(),
                agent_version: "1.80.0".into(),
                runtime_version: "Docker version 20.10".into(),
            })
        }
    }

    #[test]
    fn test_resolve_default_instance_type() {
        let mut params = StackParams::new(REQUIRED_PARAMETERS);
        assert_eq!(resolve_instance_type(&mut params), DEFAULT_INSTANCE_TYPE);
        assert_eq!(params.get(keys::INSTANCE_TYPE).unwrap(), DEFAULT_INSTANCE_TYPE);
    }

    #[test]
    fn test_resolve_explicit_instance_type() {
        let mut params = StackParams::new(REQUIRED_PARAMETERS);
        params.add(keys::INSTANCE_TYPE, "m5.large");
        assert_eq!(resolve_instance_type(&mut params), "m5.large");
    }

    #[test]
    fn test_validate_instance_type() {
        let supported = vec!["t2.micro".to_string()];
        assert!(validate_instance_type("t2.micro", &supported, "us-west-1").is_ok());

        let err = validate_instance_type("a1.medium", &supported, "us-west-1").unwrap_err();
        assert!(matches!(err, StratusError::UnsupportedInstanceType { .. }));
        let msg = err.to_string();
        assert!(msg.contains("a1.medium"));
        assert!(msg.contains("us-west-1"));
    }

    #[test]
    fn test_validate_instance_type_exact_match_only() {
        let supported = vec!["t2.micro".to_string()];
        assert!(validate_instance_type("t2.*", &supported, "r").is_err());
        assert!(validate_instance_type("T2.MICRO", &supported, "r").is_err());
    }

    #[tokio::test]
    async fn test_resolve_image_populates_ami() {
        let catalog = FixedCatalog::new(false);
        let mut params = StackParams::new(REQUIRED_PARAMETERS);
        resolve_image(&mut params, &catalog).await.unwrap();

        assert_eq!(params.get(keys::AMI_ID).unwrap(), "ami-deadb33f");
        assert_eq!(*catalog.requested.lock().unwrap(), vec!["t2.micro".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_image_keeps_supplied_ami() {
        let catalog = FixedCatalog::new(false);
        let mut params = StackParams::new(REQUIRED_PARAMETERS);
        params.add(keys::AMI_ID, "ami-12345");
        resolve_image(&mut params, &catalog).await.unwrap();

        assert_eq!(params.get(keys::AMI_ID).unwrap(), "ami-12345");
        assert!(catalog.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_image_propagates_lookup_error() {
        let catalog = FixedCatalog::new(true);
        let mut params = StackParams::new(REQUIRED_PARAMETERS);
        let err = resolve_image(&mut params, &catalog).await.unwrap_err();
        assert_eq!(err.to_string(), "ssm error: ParameterNotFound: no image");
        assert_eq!(params.lookup(keys::AMI_ID), Lookup::Absent);
    }
}
