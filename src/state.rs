use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use log::warn;

use crate::cache::ResultCache;
use crate::config::Config;
use crate::data::filter::{SampleFilter, SummaryStats};
use crate::data::loader::ContainerInput;
use crate::data::model::{DisplacementSample, PointId, TidyModel};
use crate::error::Result;
use crate::pipeline;

// ---------------------------------------------------------------------------
// Analysis session
// ---------------------------------------------------------------------------

/// One analysis session, independent of any rendering.
///
/// Owns the cache and the current model; presentation code only reads.
pub struct Session {
    pub config: Config,

    cache: ResultCache<TidyModel>,

    /// Current model (None until something loads successfully).
    pub model: Option<Arc<TidyModel>>,

    /// Inputs the current model was built from, kept for re-sampling.
    inputs: Vec<ContainerInput>,

    pub sample_size: usize,

    /// Fixed seed for reproducible draws; `None` draws fresh subsets.
    pub seed: Option<u64>,

    /// Selected date and points.
    pub filter: SampleFilter,

    /// Last error, for display.
    pub status_message: Option<String>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            cache: ResultCache::from_expiry(&config.cache.expiry),
            sample_size: config.sampling.default,
            config,
            model: None,
            inputs: Vec::new(),
            seed: None,
            filter: SampleFilter::default(),
            status_message: None,
        }
    }

    /// Run the pipeline on new inputs and adopt the result.
    ///
    /// On failure the previous model stays in place and the error is kept in
    /// `status_message` as well as returned.
    pub fn load(&mut self, inputs: Vec<ContainerInput>) -> Result<Arc<TidyModel>> {
        match pipeline::run(&self.cache, &inputs, self.sample_size, self.seed, &self.config) {
            Ok(model) => {
                self.inputs = inputs;
                self.set_model(Arc::clone(&model));
                Ok(model)
            }
            Err(e) => {
                warn!("pipeline run failed: {e}");
                self.status_message = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Change the sample size and re-run on the current inputs.
    pub fn set_sample_size(&mut self, n: usize) -> Result<Arc<TidyModel>> {
        let previous = self.sample_size;
        self.sample_size = n;
        let inputs = std::mem::take(&mut self.inputs);
        let result = self.load(inputs.clone());
        if result.is_err() {
            self.sample_size = previous;
            self.inputs = inputs;
        }
        result
    }

    /// Adopt a model and reset the selection to its defaults: first date,
    /// first `default_selection` points.
    fn set_model(&mut self, model: Arc<TidyModel>) {
        self.filter = SampleFilter {
            date: model.epochs().first().map(|e| e.date),
            points: Some(
                model
                    .default_selection(self.config.default_selection)
                    .into_iter()
                    .collect(),
            ),
        };
        self.model = Some(model);
        self.status_message = None;
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.filter.date = Some(date);
    }

    /// Toggle a single point in the selection.
    pub fn toggle_point(&mut self, id: PointId) {
        let selected = self.filter.points.get_or_insert_with(BTreeSet::new);
        if !selected.remove(&id) {
            selected.insert(id);
        }
    }

    pub fn select_all_points(&mut self) {
        if let Some(model) = &self.model {
            self.filter.points = Some(model.point_cloud().iter().map(|p| p.id).collect());
        }
    }

    pub fn select_no_points(&mut self) {
        self.filter.points = Some(BTreeSet::new());
    }

    pub fn selected_points(&self) -> Vec<PointId> {
        self.filter
            .points
            .as_ref()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Time series of the selected points (all dates).
    pub fn selected_time_series(&self) -> Vec<&DisplacementSample> {
        match &self.model {
            Some(model) => model.time_series(&self.selected_points()),
            None => Vec::new(),
        }
    }

    /// Statistics over every sampled point on the selected date.
    pub fn date_stats(&self) -> Option<SummaryStats> {
        let model = self.model.as_ref()?;
        model.summary_stats(self.filter.date?, None)
    }

    /// Drop every cached result (new data on disk, tests).
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &ResultCache<TidyModel> {
        &self.cache
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
