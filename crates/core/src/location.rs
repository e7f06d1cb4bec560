/// Azure accepts both `West Europe` and `westeurope`; state always holds the latter.
pub fn normalize(input: &str) -> String {
    input.replace(' ', "").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn strips_spaces_and_lowercases() {
        assert_eq!(normalize("West Europe"), "westeurope");
        assert_eq!(normalize("eastus2"), "eastus2");
        assert_eq!(normalize("  UK South "), "uksouth");
    }
}
