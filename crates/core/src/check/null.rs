use async_trait::async_trait;

use super::ReachabilityCheck;

/// Always unavailable. Used for devices that are tracked but not probed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCheck;

#[async_trait]
impl ReachabilityCheck for NullCheck {
    async fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_available() {
        assert!(!NullCheck.is_available().await);
    }
}
