/*!

This is the long-form manual for `ab_session` and `abtest`.

## Input formats

The following formats are supported:
* `csv` Comma Separated Values, UTF-8, double quotes for escaping
* `xlsx`, `xls` Excel workbooks (only the first sheet is read)

Files larger than 5 MB are refused before being read.

### Columns

The first row is the header. The survey needs at least these two columns:

| StandardQuestion | ResponseA | ResponseB | ResponseC | ResponseD |
|------------------|-----------|-----------|-----------|-----------|
| optional         | required  | required  | optional  | optional  |

Each following row is one question. Empty cells are ignored, so a row with only
`ResponseA` and `ResponseB` filled gives a question with two options, even if the
file has the `ResponseC` column. `ResponseA` and `ResponseB` must be filled on
every row. At most 500 rows are accepted.

The header names can be changed in the configuration file, for instance to use
localized names. The `zh` preset uses `标准问题`, `回复A`, `回复B`, `回复C` and `回复D`.

## Answering

The options of a question are shown in a random order, labelled by their position
on screen. The answer is recorded under the column the option came from, so the
shuffling never changes what is exported. Coming back to a question may show the
options in a different order.

It is not possible to move past a question without answering it. Earlier
questions, and questions already answered, can be revisited at any time before
submitting.

A note can be attached to every option of a question. Only the note of the chosen
option is exported: if the answer is changed after writing a note, the note stays
with the option it was written for.

## Saving and recovery

Every answer, note and move is saved on disk. If the program stops, the next run
resumes on the same question. The saved state belongs to the session id of the
device; a state saved under another id is ignored.

Starting over discards the saved progress but keeps the last submitted results
and the session id.

## Configuration

`abtest --config survey.json` reads a JSON file. Every field is optional:

```json
{
  "columns": "zh",
  "columnNames": {
    "standardQuestion": "Prompt",
    "responseA": "Model 1",
    "responseB": "Model 2"
  },
  "maxRows": 500,
  "maxFileBytes": 5242880,
  "anonymousNickname": "Anonymous",
  "exportFilePrefix": "ab_test_results",
  "exportSheetName": "Results"
}
```

`columnNames` entries override the preset selected with `columns`.

## Export

Results are exported as CSV (UTF-8 with a byte order mark, every value quoted)
or as an Excel workbook with a single `Results` sheet. Both contain the columns
`Index`, `StandardQuestion`, `ResponseA` to `ResponseD`, `Choice`, `Label` and
`Note`. `Label` is left empty for annotation after the fact.

*/
