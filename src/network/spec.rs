use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::layers::dense::Layer;
use crate::layers::kind::LayerKind;
use crate::optim::hyperparams::Hyperparams;

/// Describes one layer after the input in a `NetworkSpec`.
///
/// Fields:
/// - `units` : number of units in this layer
/// - `kind`  : the layer's behaviour (activation, dropout, tied weights)
/// - `params`: per-layer hyperparameters; missing fields take their defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub units: usize,
    pub kind: LayerKind,
    #[serde(default)]
    pub params: Hyperparams,
}

/// A serializable description of a layer stack: the layers after the input
/// plus the seed that drives weight initialization and dropout.
///
/// The input width is not part of a `NetworkSpec`; it comes from the input adapter
/// the stack is built over (see `Network::from_spec`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name, used in logs.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub seed: u64,
    /// Ordered layer descriptions (first hidden → output).
    pub layers: Vec<LayerSpec>,
}

impl NetworkSpec {
    pub fn new(seed: u64) -> NetworkSpec {
        NetworkSpec { name: None, seed, layers: Vec::new() }
    }

    pub fn with_name(mut self, name: &str) -> NetworkSpec {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_layer(mut self, units: usize, kind: LayerKind, params: Hyperparams) -> NetworkSpec {
        self.layers.push(LayerSpec { units, kind, params });
        self
    }

    /// The stack used by the demo binary: 8 tanh units and a two-class
    /// softmax output.
    pub fn xor_default() -> NetworkSpec {
        let params = Hyperparams::default().with_rate(0.05).with_momentum(0.5, 2_000, 0.9);
        NetworkSpec::new(42)
            .with_name("xor")
            .with_layer(8, LayerKind::Tanh, params.clone())
            .with_layer(2, LayerKind::Softmax, params)
    }

    /// Unbound layers, ready for `Network::new`.
    pub fn build_layers(&self) -> Vec<Layer> {
        self.layers.iter()
            .map(|l| Layer::new(l.units, l.kind, l.params.clone()))
            .collect()
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json(path: &str) -> Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn json_uses_snake_case_kinds_and_null_norm() {
        let spec = NetworkSpec::new(1)
            .with_layer(3, LayerKind::RectifierWithDropout, Hyperparams::default());
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"rectifier_with_dropout\""));
        assert!(json.contains("\"max_w2\":null"));
    }

    #[test]
    fn params_default_when_omitted() {
        let json = r#"{ "seed": 7, "layers": [
            { "units": 4, "kind": "tanh_prime" },
            { "units": 2, "kind": "softmax", "params": { "rate": 0.1, "max_w2": 2.5 } }
        ] }"#;
        let spec: NetworkSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.name, None);
        assert_eq!(spec.layers[0].params, Hyperparams::default());
        assert_eq!(spec.layers[1].params.rate, 0.1);
        assert_eq!(spec.layers[1].params.max_w2, 2.5);
        assert_eq!(spec.build_layers()[0].kind, LayerKind::TanhPrime);
    }

    #[test]
    fn save_and_load_round_trip() {
        let file = format!("ferrite-layers-spec-{}.json", std::process::id());
        let path = std::env::temp_dir().join(file);
        let path = path.to_str().unwrap();
        let spec = NetworkSpec::xor_default();
        spec.save_json(path).unwrap();
        let loaded = NetworkSpec::load_json(path).unwrap();
        std::fs::remove_file(path).unwrap();
        assert_eq!(loaded, spec);
    }

    #[test]
    fn load_reports_io_and_json_errors() {
        assert!(matches!(NetworkSpec::load_json("/nonexistent/spec.json"), Err(Error::Io(_))));

        let file = format!("ferrite-layers-bad-{}.json", std::process::id());
        let path = std::env::temp_dir().join(file);
        std::fs::write(&path, "{ \"layers\": 3 }").unwrap();
        let result = NetworkSpec::load_json(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(Error::Json(_))));
    }
}
