use crate::error::Error;

/// Parsed user choice of files from the enumerated list.
#[derive(Debug, Default)]
pub struct Selection {
    /// Valid 1-based indices, in the order given, without repeats.
    pub indices: Vec<usize>,
    /// One error per token that could not be used.
    pub rejected: Vec<Error>,
}

impl Selection {
    /// Parses whitespace-separated 1-based indices into a list of `available` entries.
    pub fn parse(input: &str, available: usize) -> Self {
        let mut selection = Selection::default();

        for token in input.split_whitespace() {
            let index = match token.parse::<usize>() {
                Ok(index) => index,
                Err(_) => {
                    selection.rejected.push(Error::InvalidSelection {
                        token: token.to_string(),
                    });
                    continue;
                }
            };

            if index == 0 || index > available {
                selection
                    .rejected
                    .push(Error::SelectionOutOfRange { index, available });
            } else if !selection.indices.contains(&index) {
                selection.indices.push(index);
            }
        }

        selection
    }

    pub fn resolve<'a>(&self, links: &'a [String]) -> Vec<&'a String> {
        self.indices
            .iter()
            .filter_map(|&i| links.get(i - 1))
            .collect()
    }
}
