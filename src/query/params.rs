use std::collections::BTreeMap;

/// A URL query string in comma-array form: `hauntId=1,2&search=foo`.
///
/// Each key maps to its comma-separated parts, decoded individually, so a
/// literal comma inside a value survives as `%2C`. Empty parts are kept so
/// that joining the parts gives back the raw value. Keys serialize in sorted
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let mut params = BTreeMap::new();
        let query = query.strip_prefix('?').unwrap_or(query);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode(raw_key);
            if key.is_empty() {
                continue;
            }
            let parts: Vec<String> = raw_value.split(',').map(decode).collect();
            params.insert(key, parts);
        }

        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.params.get(key).map(Vec::as_slice)
    }

    /// First non-empty part of a key, for scalar params such as `sort`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|parts| parts.iter().find(|p| !p.is_empty()))
            .map(String::as_str)
    }

    pub fn set(&mut self, key: &str, parts: Vec<String>) {
        self.params.insert(key.to_string(), parts);
    }

    pub fn remove(&mut self, key: &str) {
        self.params.remove(key);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(key, parts)| {
                let value = parts
                    .iter()
                    .map(|p| urlencoding::encode(p).into_owned())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}={value}", urlencoding::encode(key))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}
